//! Storage contract and the in-memory reference backend.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::context::Context;
use crate::error::AuditError;
use crate::event::Event;
use crate::query::Query;

/// Persistence for audit events.
///
/// Every backend must honor the same query semantics as [`MemoryStorage`]:
/// AND-ed equality filters, inclusive time bounds, ascending timestamp order,
/// and a limit applied after filtering and ordering. An empty tenant filter
/// means "no tenant restriction".
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist one event and return it as stored.
    async fn save(&self, ctx: &Context, event: Event) -> Result<Event, AuditError>;

    /// Return the events matching `query`, ascending by timestamp.
    async fn query(&self, ctx: &Context, query: &Query) -> Result<Vec<Event>, AuditError>;

    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;
}

/// In-memory storage for development and tests.
///
/// Append-only; queries scan everything under the read lock.
pub struct MemoryStorage {
    events: RwLock<Vec<Event>>,
}

impl MemoryStorage {
    pub const BACKEND: &'static str = "memory";

    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::with_capacity(1024)),
        }
    }

    /// Number of stored events. Still counts them after a writer panicked.
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, ctx: &Context, event: Event) -> Result<Event, AuditError> {
        ctx.check()?;
        let mut events = self.events.write().map_err(|e| {
            AuditError::storage(Self::BACKEND, format!("failed to acquire write lock: {}", e))
        })?;
        events.push(event.clone());
        Ok(event)
    }

    async fn query(&self, ctx: &Context, query: &Query) -> Result<Vec<Event>, AuditError> {
        ctx.check()?;
        let events = self.events.read().map_err(|e| {
            AuditError::storage(Self::BACKEND, format!("failed to acquire read lock: {}", e))
        })?;
        Ok(query.apply(events.iter().cloned()))
    }

    fn backend(&self) -> &'static str {
        Self::BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_memory_storage_query() {
        let storage = MemoryStorage::new();
        let ctx = Context::background();

        let event1 = Event::builder("client_a", "login").id("1").build();
        let event2 = Event::builder("client_b", "login").id("2").build();

        storage.save(&ctx, event1).await.unwrap();
        storage.save(&ctx, event2).await.unwrap();
        assert_eq!(storage.len(), 2);

        let results = storage.query(&ctx, &Query::for_tenant("client_a")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tenant, "client_a");

        // No tenant restriction.
        let results = storage.query(&ctx, &Query::default()).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_since_until_limit_and_sort() {
        let storage = MemoryStorage::new();
        let ctx = Context::background();
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(2_000, 0).unwrap();
        let t2 = Utc.timestamp_opt(3_000, 0).unwrap();

        for (action, ts) in [("z", t2), ("x", t0), ("y", t1)] {
            let event = Event::builder("t", action).timestamp(ts).build();
            storage.save(&ctx, event).await.unwrap();
        }

        let res = storage.query(&ctx, &Query::for_tenant("t").since(t1)).await.unwrap();
        let stamps: Vec<_> = res.iter().map(|e| e.timestamp.unwrap()).collect();
        assert_eq!(stamps, vec![t1, t2]);

        let res = storage.query(&ctx, &Query::for_tenant("t").until(t1)).await.unwrap();
        let stamps: Vec<_> = res.iter().map(|e| e.timestamp.unwrap()).collect();
        assert_eq!(stamps, vec![t0, t1]);

        let res = storage.query(&ctx, &Query::for_tenant("t").limit(1)).await.unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].action, "x");
    }

    #[tokio::test]
    async fn test_len_after_poisoned_lock() {
        let storage = std::sync::Arc::new(MemoryStorage::new());
        let ctx = Context::background();
        storage
            .save(&ctx, Event::builder("t", "login").id("1").build())
            .await
            .unwrap();

        let poisoner = storage.clone();
        let joined = std::thread::spawn(move || {
            let _guard = poisoner.events.write().unwrap();
            panic!("writer panicked while holding the lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(storage.events.is_poisoned());

        assert_eq!(storage.len(), 1);
        assert!(!storage.is_empty());

        let err = storage
            .save(&ctx, Event::builder("t", "login").id("2").build())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::StorageUnavailable { backend: "memory", .. }));
    }

    #[tokio::test]
    async fn test_results_are_copies() {
        let storage = MemoryStorage::new();
        let ctx = Context::background();
        storage.save(&ctx, Event::builder("t", "a").id("1").build()).await.unwrap();

        let mut res = storage.query(&ctx, &Query::default()).await.unwrap();
        res[0].action = "tampered".into();

        let again = storage.query(&ctx, &Query::default()).await.unwrap();
        assert_eq!(again[0].action, "a");
    }

    #[tokio::test]
    async fn test_cancelled_context_is_rejected() {
        let storage = MemoryStorage::new();
        let ctx = Context::background();
        ctx.cancel();

        let err = storage.save(&ctx, Event::builder("t", "a").build()).await.unwrap_err();
        assert!(matches!(err, AuditError::Cancelled));
        assert!(storage.is_empty());

        let err = storage.query(&ctx, &Query::default()).await.unwrap_err();
        assert!(matches!(err, AuditError::Cancelled));
    }
}
