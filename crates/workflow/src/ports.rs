//! Collaborator contracts consumed by the engine.
//!
//! Each trait is `Send + Sync` so the engine holds implementations as
//! `Arc<dyn Trait>`. [`crate::pg`] backs them with PostgreSQL and
//! [`crate::memory`] with in-process state.

use async_trait::async_trait;
use wayfinder_core::change_request::ChangeStatus;
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_db::models::change_request::{ChangeRequest, CreateChangeRequest, ReviewDecision};
use wayfinder_db::models::destination::{Destination, NewDestination};
use wayfinder_db::models::destination_version::{CreateDestinationVersion, DestinationVersion};
use wayfinder_db::models::import_job::{
    CreateImportJob, CreateImportRow, DestinationImportJob, DestinationImportRow, FinishImportJob,
};

use crate::error::WorkflowResult;

/// Result of a compare-and-swap write.
///
/// `Conflict` carries the row as it stands now so callers can tell a stale
/// token from a status change; `NotFound` means there is no such row.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome<T, C = T> {
    Updated(T),
    Conflict { current: C },
    NotFound,
}

/// Persistence for change requests.
#[async_trait]
pub trait ChangeRequestStore: Send + Sync {
    /// Insert a new draft at `draft_version = 1`.
    async fn create(&self, input: &CreateChangeRequest) -> WorkflowResult<ChangeRequest>;

    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<ChangeRequest>>;

    /// Oldest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<ChangeStatus>,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<ChangeRequest>>;

    /// Newest first.
    async fn list_by_author(&self, author_id: UserId) -> WorkflowResult<Vec<ChangeRequest>>;

    /// Replace the payload and bump `draft_version`, provided the stored
    /// version equals `expected_draft_version` and the status is editable.
    async fn update_draft(
        &self,
        id: DbId,
        expected_draft_version: i32,
        payload: &DestinationFields,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>>;

    /// Move an editable request to `pending_review`, clearing any earlier
    /// review outcome.
    async fn submit(&self, id: DbId) -> WorkflowResult<CasOutcome<ChangeRequest>>;

    /// Status compare-and-swap from `decision.from` to `decision.to`.
    async fn transition(
        &self,
        id: DbId,
        decision: &ReviewDecision,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>>;

    /// Record what an approval produced on an `approved` request.
    async fn set_published(
        &self,
        id: DbId,
        destination_id: DbId,
        published_version: i32,
    ) -> WorkflowResult<Option<ChangeRequest>>;
}

/// Read-only destination access used for existence and slug checks.
#[async_trait]
pub trait DestinationLookup: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<Destination>>;

    async fn find_by_slug(&self, slug: &str) -> WorkflowResult<Option<Destination>>;
}

/// Writes to the destination aggregate. Only the approval applier uses it.
#[async_trait]
pub trait DestinationStore: DestinationLookup {
    /// Insert at version 1. A taken slug fails with `CoreError::Conflict`.
    async fn create(&self, input: &NewDestination) -> WorkflowResult<Destination>;

    /// Write `destination` and bump its version, provided the stored
    /// version still equals `expected_version`.
    async fn update(
        &self,
        destination: &Destination,
        expected_version: i32,
    ) -> WorkflowResult<CasOutcome<Destination, i32>>;

    /// Physically remove the row, guarded by `expected_version`.
    async fn hard_delete(
        &self,
        id: DbId,
        expected_version: i32,
    ) -> WorkflowResult<CasOutcome<(), i32>>;
}

/// The append-only version ledger.
#[async_trait]
pub trait VersionLedger: Send + Sync {
    async fn append(&self, entry: &CreateDestinationVersion) -> WorkflowResult<DestinationVersion>;

    /// Entries for a destination in version order.
    async fn history(&self, destination_id: DbId) -> WorkflowResult<Vec<DestinationVersion>>;
}

/// Persistence for import jobs and their row outcomes.
#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn create_job(&self, input: &CreateImportJob) -> WorkflowResult<DestinationImportJob>;

    async fn finish_job(
        &self,
        id: DbId,
        input: &FinishImportJob,
    ) -> WorkflowResult<DestinationImportJob>;

    async fn find_job(&self, id: DbId) -> WorkflowResult<Option<DestinationImportJob>>;

    async fn list_jobs_by_uploader(
        &self,
        uploaded_by: UserId,
    ) -> WorkflowResult<Vec<DestinationImportJob>>;

    async fn insert_row(&self, input: &CreateImportRow) -> WorkflowResult<DestinationImportRow>;

    /// Row outcomes in row order.
    async fn list_rows(&self, job_id: DbId) -> WorkflowResult<Vec<DestinationImportRow>>;
}

/// Object storage. Returns the public URL of the stored object.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> WorkflowResult<String>;
}

/// Bytes plus their content type, going into or out of an [`ImageProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Optional image transformation applied before upload. The output content
/// type may differ from the input.
#[async_trait]
pub trait ImageProcessor: Send + Sync {
    async fn process(&self, input: ImageData, max_dimension: u32) -> WorkflowResult<ImageData>;
}
