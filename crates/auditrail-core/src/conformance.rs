//! Cross-backend checks against [`MemoryStorage`].
//!
//! Enabled with the `test-util` feature. Seed timestamps are distinct, since
//! backends only agree on ordering up to ties. Backend crates seed their storage
//! with [`seed_events`] and call [`assert_matches_reference`] to verify they
//! answer every [`reference_queries`] entry exactly like the in-memory
//! reference.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::context::Context;
use crate::event::{Actor, Event, Target};
use crate::query::Query;
use crate::storage::{MemoryStorage, Storage};

fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, nanos).single().unwrap_or_default()
}

/// A fixed event set with distinct timestamps, saved out of order. Tenant
/// `t3` holds an event past year 9999.
pub fn seed_events() -> Vec<Event> {
    vec![
        Event::builder("t1", "login")
            .id("e-03")
            .timestamp(at(3_000, 0))
            .actor(Actor {
                id: "alice".into(),
                ip: Some("10.0.0.1".into()),
                user_agent: Some("curl/8.5".into()),
                ..Default::default()
            })
            .build(),
        Event::builder("t1", "document.update")
            .id("e-01")
            .timestamp(at(1_000, 0))
            .actor_id("bob")
            .actor_attribute("role", "editor")
            .target(Target {
                id: "doc-1".into(),
                kind: "document".into(),
                name: "Q3 plan".into(),
            })
            .data("fields", json!(["title", "body"]))
            .build(),
        Event::builder("t2", "login")
            .id("e-02")
            .timestamp(at(2_000, 0))
            .actor_id("alice")
            .build(),
        Event::builder("t1", "login")
            .id("e-04")
            .timestamp(at(2_000, 500))
            .actor_id("bob")
            .build(),
        Event::builder("t1", "document.update")
            .id("e-05")
            .timestamp(at(4_000, 0))
            .actor_id("alice")
            .target(Target::new("doc-2", "document"))
            .data("nested", json!({ "a": { "b": [1, 2, 3] } }))
            .build(),
        Event::builder("t1", "logout")
            .id("e-06")
            .timestamp(at(2_500, 0))
            .actor_id("alice")
            .build(),
        // 10000-01-01T00:00:00Z, saved before an earlier event of the same tenant.
        Event::builder("t3", "archive")
            .id("e-07")
            .timestamp(at(253_402_300_800, 0))
            .actor_id("carol")
            .build(),
        Event::builder("t3", "archive")
            .id("e-08")
            .timestamp(at(5_000, 0))
            .actor_id("carol")
            .build(),
    ]
}

/// Queries every backend must answer identically.
pub fn reference_queries() -> Vec<Query> {
    vec![
        Query::for_tenant("t1"),
        Query::for_tenant("t2"),
        Query::for_tenant("nobody"),
        Query::for_tenant("t1").action("login"),
        Query::for_tenant("t1").actor_id("alice"),
        Query::for_tenant("t1").actor_id("alice").action("document.update"),
        Query::for_tenant("t1").target_id("doc-1"),
        Query::for_tenant("t1").since(at(2_000, 0)),
        Query::for_tenant("t1").until(at(2_000, 0)),
        Query::for_tenant("t1").since(at(2_000, 0)).until(at(3_000, 0)),
        Query::for_tenant("t1").since(at(2_000, 1)),
        Query::for_tenant("t1").limit(2),
        Query::for_tenant("t1").action("login").limit(1),
        Query::for_tenant("t1").limit(0),
        Query::for_tenant("t3").limit(1),
        Query::for_tenant("t3").since(at(6_000, 0)),
        Query::for_tenant("t3").until(at(6_000, 0)),
        Query::default(),
        Query::default().action("login"),
        Query::default().actor_id("alice").limit(3),
        Query {
            tenant: Some(String::new()),
            action: Some("logout".into()),
            ..Default::default()
        },
    ]
}

/// Save [`seed_events`] into `storage`.
pub async fn seed(storage: &dyn Storage) {
    let ctx = Context::background();
    for event in seed_events() {
        if let Err(e) = storage.save(&ctx, event).await {
            panic!("{} failed to save seed event: {}", storage.backend(), e);
        }
    }
}

/// Assert that `storage`, already seeded with [`seed_events`], answers every
/// reference query like [`MemoryStorage`].
pub async fn assert_matches_reference(storage: &dyn Storage) {
    let reference = MemoryStorage::new();
    seed(&reference).await;

    let ctx = Context::background();
    for query in reference_queries() {
        let expected = match reference.query(&ctx, &query).await {
            Ok(events) => events,
            Err(e) => panic!("reference failed for {:?}: {}", query, e),
        };
        let actual = match storage.query(&ctx, &query).await {
            Ok(events) => events,
            Err(e) => panic!("{} failed for {:?}: {}", storage.backend(), query, e),
        };
        assert_eq!(
            actual,
            expected,
            "{} diverged from the reference for {:?}",
            storage.backend(),
            query
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reference_agrees_with_itself() {
        let storage = MemoryStorage::new();
        seed(&storage).await;
        assert_matches_reference(&storage).await;
    }

    #[test]
    fn test_seed_timestamps_are_distinct() {
        let mut stamps: Vec<_> = seed_events().iter().map(|e| e.timestamp).collect();
        stamps.sort();
        stamps.dedup();
        assert_eq!(stamps.len(), seed_events().len());
    }
}
