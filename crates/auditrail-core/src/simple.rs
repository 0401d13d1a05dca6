//! Record events from loose arguments instead of a full [`Event`].

use async_trait::async_trait;

use crate::context::Context;
use crate::error::AuditError;
use crate::event::{Actor, Attributes, Event};
use crate::recorder::Recorder;

/// Minimal recording API for call sites that only have a tenant, some actor
/// attributes, an action and an optional payload.
#[async_trait]
pub trait SimpleRecorder: Send + Sync {
    async fn record(
        &self,
        ctx: &Context,
        tenant: &str,
        actor_attributes: Attributes,
        action: &str,
        data: Attributes,
    ) -> Result<Event, AuditError>;
}

/// [`SimpleRecorder`] on top of a [`Recorder`].
#[derive(Debug, Clone)]
pub struct EasyRecorder {
    recorder: Recorder,
}

impl EasyRecorder {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl SimpleRecorder for EasyRecorder {
    async fn record(
        &self,
        ctx: &Context,
        tenant: &str,
        actor_attributes: Attributes,
        action: &str,
        data: Attributes,
    ) -> Result<Event, AuditError> {
        let event = Event {
            tenant: tenant.to_string(),
            actor: Actor {
                attributes: actor_attributes,
                ..Default::default()
            },
            action: action.to_string(),
            data,
            ..Default::default()
        };
        self.recorder.record(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_easy_recorder_record() {
        let ez = EasyRecorder::new(Recorder::new(Arc::new(MemoryStorage::new())));
        let event = ez
            .record(
                &Context::background(),
                "tenant-x",
                attrs(json!({ "name": "Marcos" })),
                "update",
                attrs(json!({ "model": "users" })),
            )
            .await
            .unwrap();

        assert_eq!(event.tenant, "tenant-x");
        assert_eq!(event.action, "update");
        assert_eq!(event.actor.attributes["name"], json!("Marcos"));
        assert_eq!(event.data["model"], json!("users"));
        assert!(event.actor.id.is_empty());
        assert!(event.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_easy_recorder_validates() {
        let ez = EasyRecorder::new(Recorder::new(Arc::new(MemoryStorage::new())));
        let err = ez
            .record(&Context::background(), "", Attributes::new(), "update", Attributes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::InvalidEvent { .. }));
    }
}
