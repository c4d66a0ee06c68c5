//! The closed set of workflow events and the entity each one is about.

use serde::{Deserialize, Serialize};

/// Entity an event refers to by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSubject {
    ChangeRequest,
    ImportJob,
}

impl EventSubject {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChangeRequest => "change_request",
            Self::ImportJob => "destination_import_job",
        }
    }
}

/// Every event the engine publishes. Serialised as its dotted name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "change_request.created")]
    ChangeRequestCreated,
    #[serde(rename = "change_request.updated")]
    ChangeRequestUpdated,
    #[serde(rename = "change_request.submitted")]
    ChangeRequestSubmitted,
    #[serde(rename = "change_request.approved")]
    ChangeRequestApproved,
    #[serde(rename = "change_request.rejected")]
    ChangeRequestRejected,
    #[serde(rename = "destination_import.completed")]
    ImportCompleted,
    #[serde(rename = "destination_import.failed")]
    ImportFailed,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::ChangeRequestCreated => "change_request.created",
            Self::ChangeRequestUpdated => "change_request.updated",
            Self::ChangeRequestSubmitted => "change_request.submitted",
            Self::ChangeRequestApproved => "change_request.approved",
            Self::ChangeRequestRejected => "change_request.rejected",
            Self::ImportCompleted => "destination_import.completed",
            Self::ImportFailed => "destination_import.failed",
        }
    }

    pub fn subject(self) -> EventSubject {
        match self {
            Self::ImportCompleted | Self::ImportFailed => EventSubject::ImportJob,
            _ => EventSubject::ChangeRequest,
        }
    }

    /// Terminal review outcomes and import results.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ChangeRequestApproved
                | Self::ChangeRequestRejected
                | Self::ImportCompleted
                | Self::ImportFailed
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_as_dotted_name() {
        let json = serde_json::to_string(&EventKind::ChangeRequestApproved).unwrap();
        assert_eq!(json, "\"change_request.approved\"");
        let back: EventKind = serde_json::from_str("\"destination_import.failed\"").unwrap();
        assert_eq!(back, EventKind::ImportFailed);
        assert_eq!(EventKind::ImportFailed.to_string(), "destination_import.failed");
    }

    #[test]
    fn import_events_are_about_jobs() {
        assert_eq!(EventKind::ImportCompleted.subject(), EventSubject::ImportJob);
        assert_eq!(EventKind::ChangeRequestUpdated.subject(), EventSubject::ChangeRequest);
        assert!(!EventKind::ChangeRequestSubmitted.is_terminal());
        assert!(EventKind::ChangeRequestRejected.is_terminal());
    }
}
