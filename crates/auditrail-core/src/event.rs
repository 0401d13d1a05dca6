//! Audit event types.
//!
//! An [`Event`] records who ([`Actor`]) did what (`action`) to what
//! ([`Target`]) and when, inside a tenant partition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open, schema-less key/value payload.
pub type Attributes = Map<String, Value>;

/// Who performed the action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Stable identifier for the actor (for example, a user ID).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Network origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Client signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Arbitrary contextual metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Attributes,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
            && self.ip.is_none()
            && self.user_agent.is_none()
            && self.attributes.is_empty()
    }
}

/// What the action was performed on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Type tag (e.g. "document", "user").
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Target {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: String::new(),
        }
    }
}

/// The core audit record.
///
/// `id` and `timestamp` are populated by the recorder when unset; `tenant`
/// and `action` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    /// Unique event ID. Empty means "assign one".
    #[serde(default)]
    pub id: String,

    /// When the event occurred. `None` means "use the recorder's clock".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Partition key.
    #[serde(default)]
    pub tenant: String,

    #[serde(default, skip_serializing_if = "Actor::is_empty")]
    pub actor: Actor,

    /// Free-text verb (e.g. "login", "document.update").
    #[serde(default)]
    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    /// Payload, never interpreted.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Attributes,
}

impl Event {
    /// Create a builder for an event in `tenant` describing `action`.
    pub fn builder(tenant: impl Into<String>, action: impl Into<String>) -> EventBuilder {
        EventBuilder::new(tenant, action)
    }

    /// Identifier of the target, if the event has one.
    pub fn target_id(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.id.as_str())
    }

    /// Required fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.tenant.is_empty() {
            missing.push("tenant");
        }
        if self.action.is_empty() {
            missing.push("action");
        }
        missing
    }
}

/// Builder for creating events.
#[derive(Debug)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(tenant: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            event: Event {
                tenant: tenant.into(),
                action: action.into(),
                ..Default::default()
            },
        }
    }

    /// Set an explicit event ID.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.event.id = id.into();
        self
    }

    /// Set an explicit timestamp.
    pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.event.timestamp = Some(at);
        self
    }

    /// Set the actor.
    pub fn actor(mut self, actor: Actor) -> Self {
        self.event.actor = actor;
        self
    }

    /// Set the actor ID, keeping any other actor fields.
    pub fn actor_id(mut self, id: impl Into<String>) -> Self {
        self.event.actor.id = id.into();
        self
    }

    /// Add an actor attribute.
    pub fn actor_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.actor.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the target.
    pub fn target(mut self, target: Target) -> Self {
        self.event.target = Some(target);
        self
    }

    /// Add a payload entry.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.data.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}
