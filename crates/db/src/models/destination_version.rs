//! Destination version ledger model.
//!
//! Versions are immutable snapshots of a destination, created once per
//! applied change request and never updated or deleted.

use serde::Serialize;
use sqlx::FromRow;
use wayfinder_core::change_request::ChangeAction;
use wayfinder_core::types::{DbId, Timestamp, UserId};

/// A row from the `destination_versions` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DestinationVersion {
    pub id: DbId,
    pub destination_id: DbId,
    pub version: i32,
    pub change_request_id: DbId,
    pub action: String,
    pub snapshot: serde_json::Value,
    pub created_by: UserId,
    pub created_at: Timestamp,
}

/// DTO for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct CreateDestinationVersion {
    pub destination_id: DbId,
    pub version: i32,
    pub change_request_id: DbId,
    pub action: ChangeAction,
    pub snapshot: serde_json::Value,
    pub created_by: UserId,
}
