//! Broadcast fan-out of [`WorkflowEvent`]s.
//!
//! The workflow service and the importer hold an `Arc<EventBus>`; events are
//! published only after the transition they describe has been stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use wayfinder_core::types::{DbId, UserId};

use crate::kind::{EventKind, EventSubject};

const DEFAULT_CAPACITY: usize = 1024;

/// One stored transition of a change request or import job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub kind: EventKind,
    pub subject: EventSubject,
    /// Change request id or import job id, per `subject`.
    pub entity_id: DbId,
    pub actor_user_id: UserId,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowEvent {
    /// An event about `entity_id`. The subject follows from `kind`.
    pub fn new(kind: EventKind, entity_id: DbId, actor_user_id: UserId) -> Self {
        Self {
            kind,
            subject: kind.subject(),
            entity_id,
            actor_user_id,
            payload: serde_json::Value::Object(Default::default()),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    /// Slow receivers past `capacity` observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many subscribers the event reached; zero drops it.
    pub fn publish(&self, event: WorkflowEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
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
    async fn subject_follows_kind() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let reached = bus.publish(
            WorkflowEvent::new(EventKind::ImportCompleted, 9, 3)
                .with_payload(serde_json::json!({"rows_failed": 1})),
        );
        assert_eq!(reached, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subject, EventSubject::ImportJob);
        assert_eq!(event.entity_id, 9);
        assert_eq!(event.actor_user_id, 3);
        assert_eq!(event.payload["rows_failed"], 1);
    }

    #[test]
    fn unobserved_events_reach_nobody() {
        let bus = EventBus::default();
        assert_eq!(
            bus.publish(WorkflowEvent::new(EventKind::ChangeRequestCreated, 1, 1)),
            0
        );
    }

    #[tokio::test]
    async fn small_buffers_lag_slow_subscribers() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for id in 1..=3 {
            bus.publish(WorkflowEvent::new(EventKind::ChangeRequestUpdated, id, 1));
        }

        assert_matches::assert_matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        );
        assert_eq!(rx.recv().await.unwrap().entity_id, 2);
    }

    #[test]
    fn wire_shape_uses_dotted_kind() {
        let event = WorkflowEvent::new(EventKind::ChangeRequestApproved, 42, 7);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "change_request.approved");
        assert_eq!(json["subject"], "change_request");
        assert_eq!(json["entity_id"], 42);
    }
}
