//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Shared as `Arc<EventBus>`. Events are fire-and-forget: publishing with no
//! subscribers drops the event, and a lagging subscriber skips ahead.

use courier_core::types::{DbId, Timestamp};
use serde::Serialize;
use tokio::sync::broadcast;

/// Known event type names.
pub mod event_types {
    /// An audit rule or blacklist entry changed; cached audit settings are stale.
    pub const AUDIT_SETTINGS_CHANGED: &str = "audit.settings_changed";
}

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// Dot-separated event name, see [`event_types`].
    pub event_type: String,
    /// User whose action caused the event.
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: Timestamp,
}

impl PipelineEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_each_receive_settings_change() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(
            PipelineEvent::new(event_types::AUDIT_SETTINGS_CHANGED)
                .with_actor(3)
                .with_payload(serde_json::json!({"target_role": "agent"})),
        );

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert!(e1.is(event_types::AUDIT_SETTINGS_CHANGED));
        assert_eq!(e1.actor_user_id, Some(3));
        assert_eq!(e2.payload["target_role"], "agent");
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        EventBus::default().publish(PipelineEvent::new(event_types::AUDIT_SETTINGS_CHANGED));
    }
}
