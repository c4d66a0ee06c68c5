//! Change-request actions, statuses and the pure transition guards used by
//! the workflow engine.
//!
//! Lifecycle: `draft -> pending_review -> {approved | rejected}`, and
//! `rejected -> pending_review` again after the author edits and resubmits.
//! Only `draft` and `rejected` requests are editable by their author.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, UserId};
use crate::validation::ValidationError;

// ── Action ───────────────────────────────────────────────────────────

/// The mutation a change request proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(CoreError::invalid(format!(
                "Unknown change action '{other}'. Must be one of: create, update, delete"
            ))),
        }
    }

    /// Creates must supply every required field.
    pub fn requires_all_fields(self) -> bool {
        matches!(self, Self::Create)
    }

    /// Deletes carry no field payload worth validating.
    pub fn validates_fields(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
}

impl ChangeStatus {
    /// Statuses in which the author may edit, attach media or submit.
    pub const EDITABLE: &'static [ChangeStatus] = &[Self::Draft, Self::Rejected];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingReview => "pending_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "draft" => Ok(Self::Draft),
            "pending_review" => Ok(Self::PendingReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::Internal(format!(
                "Unknown change request status '{other}'"
            ))),
        }
    }

    pub fn is_editable(self) -> bool {
        Self::EDITABLE.contains(&self)
    }
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Guards ───────────────────────────────────────────────────────────

/// Check the action / destination-reference combination: creates must not
/// reference a destination, updates and deletes must.
pub fn check_destination_reference(
    action: ChangeAction,
    destination_id: Option<DbId>,
) -> Result<(), CoreError> {
    match (action, destination_id) {
        (ChangeAction::Create, Some(_)) => Err(CoreError::invalid(
            "destination_id must not be set for a create request",
        )),
        (ChangeAction::Update | ChangeAction::Delete, None) => Err(CoreError::invalid(format!(
            "destination_id is required for a {action} request"
        ))),
        _ => Ok(()),
    }
}

/// Only the author of a change request may edit, attach media to or submit it.
pub fn ensure_author(change_id: DbId, author_id: UserId, caller_id: UserId) -> Result<(), CoreError> {
    if author_id == caller_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Only the author may modify change request {change_id}"
        )))
    }
}

/// The request must be in an author-editable status.
pub fn ensure_editable(change_id: DbId, status: ChangeStatus) -> Result<(), CoreError> {
    if status.is_editable() {
        Ok(())
    } else {
        Err(CoreError::NotEditable {
            id: change_id,
            status,
        })
    }
}

/// Approve and reject both require `pending_review`. A second decision on an
/// already-resolved request fails rather than silently no-oping.
pub fn ensure_pending_review(change_id: DbId, status: ChangeStatus) -> Result<(), CoreError> {
    if status == ChangeStatus::PendingReview {
        Ok(())
    } else {
        Err(CoreError::InvalidChangeState {
            id: change_id,
            status,
            expected: ChangeStatus::PendingReview,
        })
    }
}

/// Reject self-review unless the policy explicitly allows it.
pub fn ensure_reviewer_allowed(
    change_id: DbId,
    submitted_by: UserId,
    reviewer_id: UserId,
    allow_self_review: bool,
) -> Result<(), CoreError> {
    if !allow_self_review && submitted_by == reviewer_id {
        Err(CoreError::ReviewerConflict { id: change_id })
    } else {
        Ok(())
    }
}

/// The optimistic-concurrency token supplied by the caller must match.
pub fn ensure_draft_version(change_id: DbId, expected: i32, current: i32) -> Result<(), CoreError> {
    if expected == current {
        Ok(())
    } else {
        Err(CoreError::StaleVersion {
            id: change_id,
            expected,
            current,
        })
    }
}

/// A rejection must explain itself. Returns the trimmed message.
pub fn normalize_review_message(message: &str) -> Result<String, ValidationError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        Err(ValidationError::single(
            "review message is required when rejecting a change request",
        ))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ChangeStatus::Draft,
            ChangeStatus::PendingReview,
            ChangeStatus::Approved,
            ChangeStatus::Rejected,
        ] {
            assert_eq!(ChangeStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn only_draft_and_rejected_are_editable() {
        assert!(ChangeStatus::Draft.is_editable());
        assert!(ChangeStatus::Rejected.is_editable());
        assert!(!ChangeStatus::PendingReview.is_editable());
        assert!(!ChangeStatus::Approved.is_editable());
    }

    #[test]
    fn create_forbids_destination_reference() {
        assert_matches!(
            check_destination_reference(ChangeAction::Create, Some(4)),
            Err(CoreError::Validation(_))
        );
        assert!(check_destination_reference(ChangeAction::Create, None).is_ok());
    }

    #[test]
    fn update_and_delete_require_destination_reference() {
        assert_matches!(
            check_destination_reference(ChangeAction::Update, None),
            Err(CoreError::Validation(e)) if e.problems[0].contains("update")
        );
        assert_matches!(
            check_destination_reference(ChangeAction::Delete, None),
            Err(CoreError::Validation(_))
        );
        assert!(check_destination_reference(ChangeAction::Delete, Some(1)).is_ok());
    }

    #[test]
    fn non_author_is_forbidden() {
        assert_matches!(ensure_author(1, 10, 11), Err(CoreError::Forbidden(_)));
        assert!(ensure_author(1, 10, 10).is_ok());
    }

    #[test]
    fn pending_review_guard_reports_current_status() {
        assert_matches!(
            ensure_pending_review(3, ChangeStatus::Approved),
            Err(CoreError::InvalidChangeState {
                id: 3,
                status: ChangeStatus::Approved,
                expected: ChangeStatus::PendingReview,
            })
        );
    }

    #[test]
    fn self_review_depends_on_policy() {
        assert_matches!(
            ensure_reviewer_allowed(5, 7, 7, false),
            Err(CoreError::ReviewerConflict { id: 5 })
        );
        assert!(ensure_reviewer_allowed(5, 7, 7, true).is_ok());
        assert!(ensure_reviewer_allowed(5, 7, 8, false).is_ok());
    }

    #[test]
    fn stale_draft_version_is_rejected() {
        assert_matches!(
            ensure_draft_version(9, 1, 2),
            Err(CoreError::StaleVersion {
                expected: 1,
                current: 2,
                ..
            })
        );
    }

    #[test]
    fn blank_review_message_is_invalid() {
        assert!(normalize_review_message("   ").is_err());
        assert_eq!(
            normalize_review_message("  needs photos ").unwrap(),
            "needs photos"
        );
    }
}
