//! The recorder: defaults, validation, and delegation to storage.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};

use crate::context::Context;
use crate::error::AuditError;
use crate::event::Event;
use crate::query::Query;
use crate::storage::Storage;

/// Time source for event timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().fixed_offset()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<FixedOffset> + Send + Sync,
{
    fn now(&self) -> DateTime<FixedOffset> {
        self()
    }
}

/// Source of identifiers for events recorded without one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// Validates and persists events through a pluggable [`Storage`].
///
/// Cheap to clone; clones share the storage, clock and ID generator.
#[derive(Clone)]
pub struct Recorder {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl Recorder {
    /// Create a recorder using the system clock and UUID identifiers.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Override the time source used for events without a timestamp.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Override the generator used for events without an ID.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Assign defaults (ID, timestamp), validate required fields, and save.
    ///
    /// Returns whatever the storage returns. On validation failure nothing is
    /// saved and the error carries the partially-defaulted event.
    pub async fn record(&self, ctx: &Context, mut event: Event) -> Result<Event, AuditError> {
        if event.id.is_empty() {
            event.id = self.ids.generate();
        }
        if event.timestamp.is_none() {
            event.timestamp = Some(self.clock.now().with_timezone(&Utc));
        }

        let missing = event.missing_fields();
        if !missing.is_empty() {
            tracing::debug!(
                event_id = %event.id,
                missing = ?missing,
                "Rejected audit event"
            );
            return Err(AuditError::InvalidEvent {
                missing,
                event: Box::new(event),
            });
        }

        tracing::debug!(
            event_id = %event.id,
            tenant = %event.tenant,
            actor = %event.actor.id,
            action = %event.action,
            backend = self.storage.backend(),
            "Recording audit event"
        );

        self.storage.save(ctx, event).await
    }

    /// Retrieve events matching `query`. Semantics are the storage's.
    pub async fn query(&self, ctx: &Context, query: &Query) -> Result<Vec<Event>, AuditError> {
        self.storage.query(ctx, query).await
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("backend", &self.storage.backend())
            .finish_non_exhaustive()
    }
}
