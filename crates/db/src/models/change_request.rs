//! Destination change request model and DTOs.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use wayfinder_core::change_request::{ChangeAction, ChangeStatus};
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::error::CoreError;
use wayfinder_core::types::{DbId, Timestamp, UserId};

/// A row from the `destination_change_requests` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ChangeRequest {
    pub id: DbId,
    pub action: String,
    pub destination_id: Option<DbId>,
    pub payload: Json<DestinationFields>,
    pub status: String,
    /// Optimistic-concurrency token for author edits.
    pub draft_version: i32,
    pub submitted_by: UserId,
    pub reviewed_by: Option<UserId>,
    pub submitted_at: Option<Timestamp>,
    pub reviewed_at: Option<Timestamp>,
    pub review_message: Option<String>,
    /// Destination version written by the approval, if approved.
    pub published_version: Option<i32>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ChangeRequest {
    pub fn change_action(&self) -> Result<ChangeAction, CoreError> {
        ChangeAction::parse(&self.action)
    }

    pub fn change_status(&self) -> Result<ChangeStatus, CoreError> {
        ChangeStatus::parse(&self.status)
    }

    pub fn fields(&self) -> &DestinationFields {
        &self.payload.0
    }
}

/// DTO for inserting a new draft (status `draft`, `draft_version` 1).
#[derive(Debug, Clone)]
pub struct CreateChangeRequest {
    pub action: ChangeAction,
    pub destination_id: Option<DbId>,
    pub payload: DestinationFields,
    pub submitted_by: UserId,
}

/// Reviewer decision recorded by a status-guarded transition.
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub from: ChangeStatus,
    pub to: ChangeStatus,
    pub reviewer_id: Option<UserId>,
    pub message: Option<String>,
}
