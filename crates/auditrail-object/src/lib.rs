//! # auditrail-object
//!
//! Event storage on any [`object_store::ObjectStore`]: S3 (with the `aws`
//! feature), the local filesystem, or memory.
//!
//! Each event is one JSON object named by a timestamp-sortable path under its
//! tenant:
//!
//! ```text
//! {prefix}/{tenant}/{YYYY}/{MM}/{DD}/{hh}/{mm}/{ss.nnnnnnnnn}-{id}.json
//! ```
//!
//! Within a tenant, key order is timestamp order as long as every year has
//! four digits. Tenant queries list the tenant prefix, skip keys outside
//! `since`/`until` without fetching them, and stop as soon as `limit` matches
//! are collected. If any key under the tenant falls outside years 0000-9999
//! (chrono renders those with a sign), the query fetches every object and
//! applies the shared rules instead. Queries without a tenant always do that.
//!
//! Events with equal timestamps come back in ID order, not insertion order,
//! since the ID is part of the key.

use std::sync::Arc;

use async_trait::async_trait;
use auditrail_core::{AuditError, Context, Event, Query, Storage};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use tracing::{debug, warn};
use url::Url;

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "auditrail";

/// `chrono` format of the timestamp portion of a key.
const KEY_TIME_FORMAT: &str = "%Y/%m/%d/%H/%M/%S%.9f";
/// Length of a rendered [`KEY_TIME_FORMAT`] for four-digit years.
const KEY_TIME_LEN: usize = 29;

/// Object-store backed storage.
pub struct ObjectEventStore {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
}

impl ObjectEventStore {
    pub const BACKEND: &'static str = "object";

    /// Create a storage over `store` using the default prefix.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: Path::from(DEFAULT_PREFIX),
        }
    }

    /// Build the object store from a URL such as `s3://bucket/audit`,
    /// `file:///var/lib/auditrail` or `memory:///`.
    ///
    /// A non-empty URL path becomes the key prefix; otherwise the default
    /// prefix is used. `options` are passed to the store builder (e.g.
    /// `aws_region`).
    pub fn from_url<I, K, V>(url: &str, options: I) -> Result<Self, AuditError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let parsed = Url::parse(url)
            .map_err(|e| AuditError::Configuration(format!("invalid object store URL: {}", e)))?;
        let (store, path) = object_store::parse_url_opts(&parsed, options)
            .map_err(|e| AuditError::Configuration(format!("unsupported object store URL: {}", e)))?;

        let storage = Self::new(Arc::from(store));
        Ok(if path.as_ref().is_empty() {
            storage
        } else {
            storage.with_prefix(path)
        })
    }

    /// Set the key prefix. Leading and trailing `/` are ignored.
    pub fn with_prefix(mut self, prefix: impl Into<Path>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    fn tenant_root(&self, tenant: &str) -> Path {
        self.prefix.child(tenant)
    }

    fn object_key(&self, tenant: &str, at: DateTime<Utc>, id: &str) -> Path {
        let rendered = at.format(KEY_TIME_FORMAT).to_string();
        let (dirs, seconds) = rendered.rsplit_once('/').unwrap_or(("", rendered.as_str()));

        let mut key = self.tenant_root(tenant);
        for part in dirs.split('/').filter(|p| !p.is_empty()) {
            key = key.child(part);
        }
        key.child(format!("{}-{}.json", seconds, id))
    }

    async fn list(&self, ctx: &Context, prefix: &Path) -> Result<Vec<ObjectMeta>, AuditError> {
        let mut listing: Vec<ObjectMeta> = ctx
            .run(self.store.list(Some(prefix)).try_collect::<Vec<_>>())
            .await?
            .map_err(|e| AuditError::storage(Self::BACKEND, format!("list failed: {}", e)))?;
        listing.sort_by(|a, b| a.location.cmp(&b.location));
        Ok(listing)
    }

    /// Fetch and decode one object. Undecodable objects yield `None`.
    async fn fetch(&self, ctx: &Context, location: &Path) -> Result<Option<Event>, AuditError> {
        ctx.check()?;
        let bytes = ctx
            .run(async { self.store.get(location).await?.bytes().await })
            .await?
            .map_err(|e| AuditError::storage(Self::BACKEND, format!("get {} failed: {}", location, e)))?;

        match serde_json::from_slice::<Event>(&bytes) {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                warn!(location = %location, error = %e, "Skipping undecodable audit object");
                Ok(None)
            }
        }
    }

    async fn fetch_all(&self, ctx: &Context, listing: &[ObjectMeta]) -> Result<Vec<Event>, AuditError> {
        let mut events = Vec::with_capacity(listing.len());
        for meta in listing {
            events.extend(self.fetch(ctx, &meta.location).await?);
        }
        Ok(events)
    }
}

/// The timestamp portion of a key relative to the tenant root, if it has the
/// fixed-width `YYYY/MM/DD/hh/mm/ss.nnnnnnnnn` shape. Keys in that shape sort
/// in timestamp order.
fn key_stamp(relative: &str) -> Option<&str> {
    let stamp = relative.get(..KEY_TIME_LEN)?;
    let well_formed = stamp.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 | 10 | 13 | 16 => b == b'/',
        19 => b == b'.',
        _ => b.is_ascii_digit(),
    });
    well_formed.then_some(stamp)
}

/// Whether a key timestamp can fall inside the query's time bounds.
fn stamp_in_range(stamp: &str, since: Option<&str>, until: Option<&str>) -> bool {
    since.is_none_or(|s| stamp >= s) && until.is_none_or(|u| stamp <= u)
}

/// Render a query bound in key form. Bounds outside years 0000-9999 yield
/// `None` and are then only checked on the decoded event.
fn render_bound(at: DateTime<Utc>) -> Option<String> {
    let rendered = at.format(KEY_TIME_FORMAT).to_string();
    key_stamp(&rendered).is_some().then_some(rendered)
}

#[async_trait]
impl Storage for ObjectEventStore {
    async fn save(&self, ctx: &Context, event: Event) -> Result<Event, AuditError> {
        // Keys need both; the recorder always supplies them.
        let Some(at) = event.timestamp.filter(|_| !event.tenant.is_empty()) else {
            let mut missing = event.missing_fields();
            if event.timestamp.is_none() {
                missing.push("timestamp");
            }
            return Err(AuditError::InvalidEvent {
                missing,
                event: Box::new(event),
            });
        };
        let key = self.object_key(&event.tenant, at, &event.id);
        let body = serde_json::to_vec(&event)?;

        ctx.run(self.store.put(&key, PutPayload::from(body)))
            .await?
            .map_err(|e| AuditError::storage(Self::BACKEND, format!("put {} failed: {}", key, e)))?;

        debug!(event_id = %event.id, key = %key, "Audit event uploaded");
        Ok(event)
    }

    async fn query(&self, ctx: &Context, query: &Query) -> Result<Vec<Event>, AuditError> {
        ctx.check()?;

        let Some(tenant) = query.tenant_filter() else {
            let listing = self.list(ctx, &self.prefix).await?;
            return Ok(query.apply(self.fetch_all(ctx, &listing).await?));
        };

        let root = self.tenant_root(tenant);
        let root_str = format!("{}/", root.as_ref());
        let listing = self.list(ctx, &root).await?;

        let stamps: Option<Vec<&str>> = listing
            .iter()
            .map(|meta| {
                meta.location
                    .as_ref()
                    .strip_prefix(root_str.as_str())
                    .and_then(key_stamp)
            })
            .collect();
        let Some(stamps) = stamps else {
            debug!(tenant = %tenant, listed = listing.len(), "Keys out of timestamp order, scanning all");
            return Ok(query.apply(self.fetch_all(ctx, &listing).await?));
        };

        let since = query.since.and_then(render_bound);
        let until = query.until.and_then(render_bound);
        let limit = query.effective_limit();

        let mut results = Vec::new();
        let mut fetched = 0usize;
        for (meta, stamp) in listing.iter().zip(stamps) {
            if !stamp_in_range(stamp, since.as_deref(), until.as_deref()) {
                continue;
            }

            fetched += 1;
            let Some(event) = self.fetch(ctx, &meta.location).await? else {
                continue;
            };
            if query.matches(&event) {
                results.push(event);
                if limit.is_some_and(|l| results.len() >= l) {
                    break;
                }
            }
        }

        debug!(
            tenant = %tenant,
            listed = listing.len(),
            fetched,
            matched = results.len(),
            "Object store audit query"
        );
        results.sort_by_key(|e| e.timestamp);
        Ok(results)
    }

    fn backend(&self) -> &'static str {
        Self::BACKEND
    }
}
