//! CSV import job and row models.

use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;
use wayfinder_core::change_request::ChangeAction;
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::import::tally::{ImportJobStatus, ImportRowStatus};
use wayfinder_core::types::{DbId, Timestamp, UserId};

/// A row from the `destination_import_jobs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DestinationImportJob {
    pub id: DbId,
    pub uploaded_by: UserId,
    pub file_name: String,
    /// Archived copy of the raw file; best effort, may be absent.
    pub file_url: Option<String>,
    pub dry_run: bool,
    pub notes: Option<String>,
    pub status: String,
    pub total_rows: i32,
    pub processed_rows: i32,
    pub rows_failed: i32,
    pub changes_created: i32,
    pub pending_change_ids: Vec<DbId>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a job.
#[derive(Debug, Clone)]
pub struct CreateImportJob {
    pub uploaded_by: UserId,
    pub file_name: String,
    pub file_url: Option<String>,
    pub dry_run: bool,
    pub notes: Option<String>,
    pub status: ImportJobStatus,
    pub total_rows: i32,
}

/// Final counters and status written once when a job finishes.
#[derive(Debug, Clone)]
pub struct FinishImportJob {
    pub status: ImportJobStatus,
    pub processed_rows: i32,
    pub rows_failed: i32,
    pub changes_created: i32,
    pub pending_change_ids: Vec<DbId>,
    pub error_message: Option<String>,
}

/// A row from the `destination_import_rows` table. Never updated.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DestinationImportRow {
    pub id: DbId,
    pub job_id: DbId,
    pub row_number: i32,
    pub payload: Json<DestinationFields>,
    pub action: String,
    pub status: String,
    pub change_id: Option<DbId>,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a row outcome.
#[derive(Debug, Clone)]
pub struct CreateImportRow {
    pub job_id: DbId,
    pub row_number: i32,
    pub payload: DestinationFields,
    pub action: ChangeAction,
    pub status: ImportRowStatus,
    pub change_id: Option<DbId>,
    pub error: Option<String>,
}
