//! Query filters shared by every storage backend.
//!
//! Backends that cannot filter natively (Redis lists, object listings) run
//! their candidates through [`Query::apply`], so all of them agree with the
//! in-memory reference on filtering, ordering and limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Filter for retrieving events.
///
/// Equality filters set to `None` or `Some("")` are ignored. `since` and
/// `until` are inclusive. `limit` applies after filtering and ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Query {
    /// Query restricted to a single tenant.
    pub fn for_tenant(tenant: impl Into<String>) -> Self {
        Self {
            tenant: Some(tenant.into()),
            ..Default::default()
        }
    }

    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn tenant_filter(&self) -> Option<&str> {
        non_empty(&self.tenant)
    }

    pub fn actor_filter(&self) -> Option<&str> {
        non_empty(&self.actor_id)
    }

    pub fn action_filter(&self) -> Option<&str> {
        non_empty(&self.action)
    }

    pub fn target_filter(&self) -> Option<&str> {
        non_empty(&self.target_id)
    }

    /// Positive limit, if any. Zero means unbounded.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&l| l > 0)
    }

    /// Whether the event passes every filter except the tenant one.
    pub fn matches_within_tenant(&self, event: &Event) -> bool {
        if let Some(actor) = self.actor_filter() {
            if event.actor.id != actor {
                return false;
            }
        }
        if let Some(action) = self.action_filter() {
            if event.action != action {
                return false;
            }
        }
        if let Some(target) = self.target_filter() {
            if event.target_id() != Some(target) {
                return false;
            }
        }
        self.in_time_range(event.timestamp)
    }

    /// Whether the event passes every filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(tenant) = self.tenant_filter() {
            if event.tenant != tenant {
                return false;
            }
        }
        self.matches_within_tenant(event)
    }

    /// Inclusive `since`/`until` check. An event without a timestamp only
    /// passes when neither bound is set.
    pub fn in_time_range(&self, timestamp: Option<DateTime<Utc>>) -> bool {
        match timestamp {
            Some(ts) => {
                self.since.is_none_or(|since| ts >= since)
                    && self.until.is_none_or(|until| ts <= until)
            }
            None => self.since.is_none() && self.until.is_none(),
        }
    }

    /// Filter, stable-sort ascending by timestamp, then truncate to the limit.
    pub fn apply(&self, events: impl IntoIterator<Item = Event>) -> Vec<Event> {
        let mut results: Vec<Event> = events.into_iter().filter(|e| self.matches(e)).collect();
        results.sort_by_key(|e| e.timestamp);
        if let Some(limit) = self.effective_limit() {
            results.truncate(limit);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Target;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn seed() -> Vec<Event> {
        vec![
            Event::builder("t1", "x").id("3").timestamp(at(3_000)).actor_id("a").build(),
            Event::builder("t1", "y").id("1").timestamp(at(1_000)).actor_id("b").build(),
            Event::builder("t2", "x").id("2").timestamp(at(2_000)).actor_id("a").build(),
            Event::builder("t1", "x")
                .id("4")
                .timestamp(at(2_000))
                .target(Target::new("doc", "document"))
                .build(),
        ]
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_and_semantics() {
        let q = Query::for_tenant("t1").action("x");
        assert_eq!(ids(&q.apply(seed())), vec!["4", "3"]);

        let q = Query::for_tenant("t1").action("x").actor_id("a");
        assert_eq!(ids(&q.apply(seed())), vec!["3"]);

        let q = Query::default().target_id("doc");
        assert_eq!(ids(&q.apply(seed())), vec!["4"]);
    }

    #[test]
    fn test_empty_strings_are_ignored() {
        let q = Query {
            tenant: Some(String::new()),
            action: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(q.apply(seed()).len(), 4);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let q = Query::default().since(at(2_000)).until(at(2_000));
        assert_eq!(ids(&q.apply(seed())), vec!["2", "4"]);
    }

    #[test]
    fn test_sort_is_stable_and_limit_keeps_earliest() {
        let q = Query::default();
        assert_eq!(ids(&q.apply(seed())), vec!["1", "2", "4", "3"]);

        let q = Query::default().limit(2);
        assert_eq!(ids(&q.apply(seed())), vec!["1", "2"]);

        let q = Query::default().limit(0);
        assert_eq!(q.apply(seed()).len(), 4);
    }

    #[test]
    fn test_untimed_events_fail_time_bounds() {
        let untimed = Event::builder("t1", "x").build();
        assert!(Query::default().matches(&untimed));
        assert!(!Query::default().since(at(0)).matches(&untimed));
    }
}
