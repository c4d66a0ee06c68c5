//! Background subscriber writing every [`WorkflowEvent`] to the tracing log.
//!
//! Runs until the [`EventBus`](crate::bus::EventBus) is dropped.

use tokio::sync::broadcast;

use crate::bus::WorkflowEvent;

/// Structured audit trail of workflow events.
pub struct EventAuditLog;

impl EventAuditLog {
    /// Run the audit loop. Returns the number of events logged once the
    /// channel closes.
    pub async fn run(mut receiver: broadcast::Receiver<WorkflowEvent>) -> u64 {
        let mut logged = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::record(&event);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event audit log lagged, some events were not logged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Event bus closed, audit log shutting down");
                    break;
                }
            }
        }
        logged
    }

    // Outcomes at info, intermediate edits at debug.
    fn record(event: &WorkflowEvent) {
        if event.kind.is_terminal() {
            tracing::info!(
                kind = %event.kind,
                subject = event.subject.as_str(),
                entity_id = event.entity_id,
                actor_user_id = event.actor_user_id,
                payload = %event.payload,
                "Workflow event"
            );
        } else {
            tracing::debug!(
                kind = %event.kind,
                subject = event.subject.as_str(),
                entity_id = event.entity_id,
                actor_user_id = event.actor_user_id,
                "Workflow event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::kind::EventKind;

    #[tokio::test]
    async fn logs_until_bus_is_dropped() {
        let bus = EventBus::default();
        let handle = tokio::spawn(EventAuditLog::run(bus.subscribe()));

        bus.publish(WorkflowEvent::new(EventKind::ChangeRequestCreated, 1, 1));
        bus.publish(WorkflowEvent::new(EventKind::ChangeRequestApproved, 1, 2));
        drop(bus);

        assert_eq!(handle.await.unwrap(), 2);
    }
}
