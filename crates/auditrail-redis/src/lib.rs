//! # auditrail-redis
//!
//! Redis-backed event storage.
//!
//! Events are pushed to one list per tenant (`{prefix}{tenant}:events`,
//! newest first) and filtered in the application. Queries read the whole
//! list, restore insertion order, then apply the shared [`Query`] rules, so
//! results match the in-memory reference even when callers supply
//! out-of-order timestamps.
//!
//! A query without a tenant scans every tenant list under the prefix. The
//! SCAN pattern also matches lists written under any longer prefix that
//! starts with this one (`app:` also sees `app:v2:acme:events`), so each
//! scanned event is kept only if its own tenant maps back to the key it was
//! read from. Tenants containing `:` still round-trip.

use async_trait::async_trait;
use auditrail_core::{AuditError, Context, Event, Query, Storage};
use redis::aio::MultiplexedConnection;
use tracing::{debug, warn};

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "auditrail:";

const LIST_SUFFIX: &str = ":events";
const SCAN_BATCH: usize = 200;

/// Redis list storage.
pub struct RedisStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisStore {
    pub const BACKEND: &'static str = "redis";

    /// Create a store over an existing client.
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Create a store from a Redis URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Configuration`] if the URL is invalid. No
    /// connection is made until the first call.
    pub fn open(redis_url: &str) -> Result<Self, AuditError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AuditError::Configuration(format!("invalid Redis URL: {}", e)))?;
        Ok(Self::new(client))
    }

    /// Set the prefix used for every key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn key_for_tenant(&self, tenant: &str) -> String {
        format!("{}{}{}", self.key_prefix, tenant, LIST_SUFFIX)
    }

    /// Whether `event` was written by this store into the list at `key`.
    fn owns(&self, key: &str, event: &Event) -> bool {
        self.key_for_tenant(&event.tenant) == key
    }

    /// SCAN pattern matching every tenant list under the prefix.
    fn tenant_key_pattern(&self) -> String {
        format!("{}*{}", escape_glob(&self.key_prefix), LIST_SUFFIX)
    }

    async fn connection(&self, ctx: &Context) -> Result<MultiplexedConnection, AuditError> {
        ctx.run(self.client.get_multiplexed_async_connection())
            .await?
            .map_err(|e| AuditError::storage(Self::BACKEND, format!("connection failed: {}", e)))
    }

    async fn load_list(
        &self,
        ctx: &Context,
        conn: &mut MultiplexedConnection,
        key: &str,
    ) -> Result<Vec<Event>, AuditError> {
        let raw: Vec<String> = ctx
            .run(redis::cmd("LRANGE").arg(key).arg(0).arg(-1).query_async(&mut *conn))
            .await?
            .map_err(|e| AuditError::storage(Self::BACKEND, format!("LRANGE failed: {}", e)))?;
        Ok(decode_list(key, raw))
    }

    async fn tenant_keys(
        &self,
        ctx: &Context,
        conn: &mut MultiplexedConnection,
    ) -> Result<Vec<String>, AuditError> {
        let pattern = self.tenant_key_pattern();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = ctx
                .run(
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut *conn),
                )
                .await?
                .map_err(|e| AuditError::storage(Self::BACKEND, format!("SCAN failed: {}", e)))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

/// Decode an `LRANGE 0 -1` reply (newest first) into insertion order,
/// skipping entries that are not valid events.
fn decode_list(key: &str, raw: Vec<String>) -> Vec<Event> {
    raw.into_iter()
        .rev()
        .filter_map(|entry| match serde_json::from_str::<Event>(&entry) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping undecodable audit event");
                None
            }
        })
        .collect()
}

fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Storage for RedisStore {
    async fn save(&self, ctx: &Context, event: Event) -> Result<Event, AuditError> {
        let raw = serde_json::to_string(&event)?;
        let key = self.key_for_tenant(&event.tenant);
        let mut conn = self.connection(ctx).await?;

        let _len: i64 = ctx
            .run(redis::cmd("LPUSH").arg(&key).arg(&raw).query_async(&mut conn))
            .await?
            .map_err(|e| AuditError::storage(Self::BACKEND, format!("LPUSH failed: {}", e)))?;

        debug!(event_id = %event.id, key = %key, "Audit event pushed to Redis");
        Ok(event)
    }

    async fn query(&self, ctx: &Context, query: &Query) -> Result<Vec<Event>, AuditError> {
        ctx.check()?;
        let mut conn = self.connection(ctx).await?;

        let keys = match query.tenant_filter() {
            Some(tenant) => vec![self.key_for_tenant(tenant)],
            None => self.tenant_keys(ctx, &mut conn).await?,
        };

        let mut candidates = Vec::new();
        let mut foreign = 0usize;
        for key in &keys {
            for event in self.load_list(ctx, &mut conn, key).await? {
                if self.owns(key, &event) {
                    candidates.push(event);
                } else {
                    foreign += 1;
                }
            }
        }

        debug!(
            lists = keys.len(),
            candidates = candidates.len(),
            foreign,
            "Filtering Redis audit events"
        );
        Ok(query.apply(candidates))
    }

    fn backend(&self) -> &'static str {
        Self::BACKEND
    }
}
