//! In-process implementations of the collaborator traits, compiled for
//! tests and the `test-support` feature.
//!
//! They mirror the guarded statements of the PostgreSQL repositories under a
//! single mutex, which makes every compare-and-swap atomic. Failure switches
//! let callers exercise the infrastructure error paths.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use wayfinder_core::change_request::ChangeStatus;
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::error::CoreError;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_db::models::change_request::{ChangeRequest, CreateChangeRequest, ReviewDecision};
use wayfinder_db::models::destination::{Destination, NewDestination};
use wayfinder_db::models::destination_version::{CreateDestinationVersion, DestinationVersion};
use wayfinder_db::models::import_job::{
    CreateImportJob, CreateImportRow, DestinationImportJob, DestinationImportRow, FinishImportJob,
};

use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{
    CasOutcome, ChangeRequestStore, DestinationLookup, DestinationStore, ImportStore,
    ObjectStorage, VersionLedger,
};

fn injected(operation: &str) -> WorkflowError {
    WorkflowError::Database(sqlx::Error::Protocol(format!(
        "injected failure: {operation}"
    )))
}

fn next(counter: &mut DbId) -> DbId {
    *counter += 1;
    *counter
}

#[derive(Default)]
struct State {
    change_seq: DbId,
    destination_seq: DbId,
    version_seq: DbId,
    job_seq: DbId,
    row_seq: DbId,
    changes: BTreeMap<DbId, ChangeRequest>,
    destinations: BTreeMap<DbId, Destination>,
    versions: Vec<DestinationVersion>,
    jobs: BTreeMap<DbId, DestinationImportJob>,
    rows: Vec<DestinationImportRow>,
}

#[derive(Default)]
struct Faults {
    ledger: bool,
    /// Number of upcoming job finishes that fail.
    job_finishes: usize,
    /// Fail row inserts once this many rows have been stored.
    rows_after: Option<usize>,
}

/// Every store in one process-local value.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every ledger append fail.
    pub fn fail_ledger_appends(&self, fail: bool) {
        self.faults().ledger = fail;
    }

    /// Make import row inserts fail once `stored` rows exist.
    pub fn fail_row_inserts_after(&self, stored: Option<usize>) {
        self.faults().rows_after = stored;
    }

    /// Make the next `count` import job finishes fail.
    pub fn fail_job_finishes(&self, count: usize) {
        self.faults().job_finishes = count;
    }

    pub fn destination(&self, id: DbId) -> Option<Destination> {
        self.state().destinations.get(&id).cloned()
    }

    pub fn change(&self, id: DbId) -> Option<ChangeRequest> {
        self.state().changes.get(&id).cloned()
    }

    pub fn change_count(&self) -> usize {
        self.state().changes.len()
    }

    pub fn destination_count(&self) -> usize {
        self.state().destinations.len()
    }

    /// Every ledger entry in insertion order.
    pub fn ledger_entries(&self) -> Vec<DestinationVersion> {
        self.state().versions.clone()
    }

    fn classify_change(state: &State, id: DbId) -> CasOutcome<ChangeRequest> {
        match state.changes.get(&id) {
            Some(current) => CasOutcome::Conflict {
                current: current.clone(),
            },
            None => CasOutcome::NotFound,
        }
    }

    fn classify_destination<T>(state: &State, id: DbId) -> CasOutcome<T, i32> {
        match state.destinations.get(&id) {
            Some(current) => CasOutcome::Conflict {
                current: current.version,
            },
            None => CasOutcome::NotFound,
        }
    }
}

fn is_editable(change: &ChangeRequest) -> bool {
    ChangeStatus::EDITABLE
        .iter()
        .any(|status| status.as_str() == change.status)
}

#[async_trait]
impl ChangeRequestStore for MemoryStore {
    async fn create(&self, input: &CreateChangeRequest) -> WorkflowResult<ChangeRequest> {
        let mut state = self.state();
        let now = Utc::now();
        let change = ChangeRequest {
            id: next(&mut state.change_seq),
            action: input.action.as_str().to_string(),
            destination_id: input.destination_id,
            payload: Json(input.payload.clone()),
            status: ChangeStatus::Draft.as_str().to_string(),
            draft_version: 1,
            submitted_by: input.submitted_by,
            reviewed_by: None,
            submitted_at: None,
            reviewed_at: None,
            review_message: None,
            published_version: None,
            created_at: now,
            updated_at: now,
        };
        state.changes.insert(change.id, change.clone());
        Ok(change)
    }

    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<ChangeRequest>> {
        Ok(self.state().changes.get(&id).cloned())
    }

    async fn list(
        &self,
        status: Option<ChangeStatus>,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<ChangeRequest>> {
        let state = self.state();
        Ok(state
            .changes
            .values()
            .filter(|c| status.map_or(true, |s| c.status == s.as_str()))
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn list_by_author(&self, author_id: UserId) -> WorkflowResult<Vec<ChangeRequest>> {
        let state = self.state();
        Ok(state
            .changes
            .values()
            .rev()
            .filter(|c| c.submitted_by == author_id)
            .cloned()
            .collect())
    }

    async fn update_draft(
        &self,
        id: DbId,
        expected_draft_version: i32,
        payload: &DestinationFields,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        let mut state = self.state();
        if let Some(change) = state
            .changes
            .get_mut(&id)
            .filter(|c| c.draft_version == expected_draft_version && is_editable(c))
        {
            change.payload = Json(payload.clone());
            change.draft_version += 1;
            change.updated_at = Utc::now();
            return Ok(CasOutcome::Updated(change.clone()));
        }
        Ok(Self::classify_change(&state, id))
    }

    async fn submit(&self, id: DbId) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        let mut state = self.state();
        if let Some(change) = state.changes.get_mut(&id).filter(|c| is_editable(c)) {
            let now = Utc::now();
            change.status = ChangeStatus::PendingReview.as_str().to_string();
            change.submitted_at = Some(now);
            change.reviewed_by = None;
            change.reviewed_at = None;
            change.review_message = None;
            change.updated_at = now;
            return Ok(CasOutcome::Updated(change.clone()));
        }
        Ok(Self::classify_change(&state, id))
    }

    async fn transition(
        &self,
        id: DbId,
        decision: &ReviewDecision,
    ) -> WorkflowResult<CasOutcome<ChangeRequest>> {
        let mut state = self.state();
        if let Some(change) = state
            .changes
            .get_mut(&id)
            .filter(|c| c.status == decision.from.as_str())
        {
            let now = Utc::now();
            change.status = decision.to.as_str().to_string();
            change.reviewed_by = decision.reviewer_id;
            change.reviewed_at = decision.reviewer_id.map(|_| now);
            change.review_message = decision.message.clone();
            change.updated_at = now;
            return Ok(CasOutcome::Updated(change.clone()));
        }
        Ok(Self::classify_change(&state, id))
    }

    async fn set_published(
        &self,
        id: DbId,
        destination_id: DbId,
        published_version: i32,
    ) -> WorkflowResult<Option<ChangeRequest>> {
        let mut state = self.state();
        Ok(state
            .changes
            .get_mut(&id)
            .filter(|c| c.status == ChangeStatus::Approved.as_str())
            .map(|change| {
                change.destination_id = Some(destination_id);
                change.published_version = Some(published_version);
                change.updated_at = Utc::now();
                change.clone()
            }))
    }
}

#[async_trait]
impl DestinationLookup for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> WorkflowResult<Option<Destination>> {
        Ok(self.state().destinations.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> WorkflowResult<Option<Destination>> {
        Ok(self
            .state()
            .destinations
            .values()
            .find(|d| d.slug == slug)
            .cloned())
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn create(&self, input: &NewDestination) -> WorkflowResult<Destination> {
        let mut state = self.state();
        if state.destinations.values().any(|d| d.slug == input.slug) {
            return Err(CoreError::Conflict(
                "Duplicate value violates unique constraint: uq_destinations_slug".into(),
            )
            .into());
        }
        let now = Utc::now();
        let destination = Destination {
            id: next(&mut state.destination_seq),
            name: input.name.clone(),
            slug: input.slug.clone(),
            description: input.description.clone(),
            category: input.category.clone(),
            city: input.city.clone(),
            country: input.country.clone(),
            address: input.address.clone(),
            latitude: input.latitude,
            longitude: input.longitude,
            opening_time: input.opening_time.clone(),
            closing_time: input.closing_time.clone(),
            entry_fee: input.entry_fee,
            website: input.website.clone(),
            contact_phone: input.contact_phone.clone(),
            tags: input.tags.clone(),
            hero_image_url: input.hero_image_url.clone(),
            gallery: Json(input.gallery.clone()),
            status: input.status.clone(),
            version: 1,
            created_by: input.created_by,
            updated_by: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.destinations.insert(destination.id, destination.clone());
        Ok(destination)
    }

    async fn update(
        &self,
        destination: &Destination,
        expected_version: i32,
    ) -> WorkflowResult<CasOutcome<Destination, i32>> {
        let mut state = self.state();
        let slug_taken = state
            .destinations
            .values()
            .any(|d| d.id != destination.id && d.slug == destination.slug);
        if slug_taken {
            return Err(CoreError::Conflict(
                "Duplicate value violates unique constraint: uq_destinations_slug".into(),
            )
            .into());
        }
        if let Some(stored) = state
            .destinations
            .get_mut(&destination.id)
            .filter(|d| d.version == expected_version)
        {
            let created_at = stored.created_at;
            *stored = Destination {
                version: expected_version + 1,
                created_at,
                updated_at: Utc::now(),
                ..destination.clone()
            };
            return Ok(CasOutcome::Updated(stored.clone()));
        }
        Ok(Self::classify_destination(&state, destination.id))
    }

    async fn hard_delete(
        &self,
        id: DbId,
        expected_version: i32,
    ) -> WorkflowResult<CasOutcome<(), i32>> {
        let mut state = self.state();
        let matches = state
            .destinations
            .get(&id)
            .is_some_and(|d| d.version == expected_version);
        if matches {
            state.destinations.remove(&id);
            return Ok(CasOutcome::Updated(()));
        }
        Ok(Self::classify_destination(&state, id))
    }
}

#[async_trait]
impl VersionLedger for MemoryStore {
    async fn append(&self, entry: &CreateDestinationVersion) -> WorkflowResult<DestinationVersion> {
        if self.faults().ledger {
            return Err(injected("ledger append"));
        }
        let mut state = self.state();
        let duplicate = state
            .versions
            .iter()
            .any(|v| v.destination_id == entry.destination_id && v.version == entry.version);
        if duplicate {
            return Err(WorkflowError::Database(sqlx::Error::Protocol(format!(
                "duplicate ledger entry for destination {} version {}",
                entry.destination_id, entry.version
            ))));
        }
        let version = DestinationVersion {
            id: next(&mut state.version_seq),
            destination_id: entry.destination_id,
            version: entry.version,
            change_request_id: entry.change_request_id,
            action: entry.action.as_str().to_string(),
            snapshot: entry.snapshot.clone(),
            created_by: entry.created_by,
            created_at: Utc::now(),
        };
        state.versions.push(version.clone());
        Ok(version)
    }

    async fn history(&self, destination_id: DbId) -> WorkflowResult<Vec<DestinationVersion>> {
        let mut entries: Vec<DestinationVersion> = self
            .state()
            .versions
            .iter()
            .filter(|v| v.destination_id == destination_id)
            .cloned()
            .collect();
        entries.sort_by_key(|v| v.version);
        Ok(entries)
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn create_job(&self, input: &CreateImportJob) -> WorkflowResult<DestinationImportJob> {
        let mut state = self.state();
        let now = Utc::now();
        let job = DestinationImportJob {
            id: next(&mut state.job_seq),
            uploaded_by: input.uploaded_by,
            file_name: input.file_name.clone(),
            file_url: input.file_url.clone(),
            dry_run: input.dry_run,
            notes: input.notes.clone(),
            status: input.status.as_str().to_string(),
            total_rows: input.total_rows,
            processed_rows: 0,
            rows_failed: 0,
            changes_created: 0,
            pending_change_ids: Vec::new(),
            error_message: None,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn finish_job(
        &self,
        id: DbId,
        input: &FinishImportJob,
    ) -> WorkflowResult<DestinationImportJob> {
        {
            let mut faults = self.faults();
            if faults.job_finishes > 0 {
                faults.job_finishes -= 1;
                return Err(injected("finish import job"));
            }
        }
        let mut state = self.state();
        let job = state.jobs.get_mut(&id).ok_or(CoreError::NotFound {
            entity: "DestinationImportJob",
            id,
        })?;
        let now = Utc::now();
        job.status = input.status.as_str().to_string();
        job.processed_rows = input.processed_rows;
        job.rows_failed = input.rows_failed;
        job.changes_created = input.changes_created;
        job.pending_change_ids = input.pending_change_ids.clone();
        job.error_message = input.error_message.clone();
        job.completed_at = Some(now);
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn find_job(&self, id: DbId) -> WorkflowResult<Option<DestinationImportJob>> {
        Ok(self.state().jobs.get(&id).cloned())
    }

    async fn list_jobs_by_uploader(
        &self,
        uploaded_by: UserId,
    ) -> WorkflowResult<Vec<DestinationImportJob>> {
        Ok(self
            .state()
            .jobs
            .values()
            .rev()
            .filter(|j| j.uploaded_by == uploaded_by)
            .cloned()
            .collect())
    }

    async fn insert_row(&self, input: &CreateImportRow) -> WorkflowResult<DestinationImportRow> {
        let rows_after = self.faults().rows_after;
        let mut state = self.state();
        if rows_after.is_some_and(|limit| state.rows.len() >= limit) {
            return Err(injected("insert import row"));
        }
        let row = DestinationImportRow {
            id: next(&mut state.row_seq),
            job_id: input.job_id,
            row_number: input.row_number,
            payload: Json(input.payload.clone()),
            action: input.action.as_str().to_string(),
            status: input.status.as_str().to_string(),
            change_id: input.change_id,
            error: input.error.clone(),
            created_at: Utc::now(),
        };
        state.rows.push(row.clone());
        Ok(row)
    }

    async fn list_rows(&self, job_id: DbId) -> WorkflowResult<Vec<DestinationImportRow>> {
        let mut rows: Vec<DestinationImportRow> = self
            .state()
            .rows
            .iter()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.row_number);
        Ok(rows)
    }
}

/// An object written to [`MemoryObjectStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// Object storage that keeps uploads in memory and serves `memory://` URLs.
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<Vec<StoredObject>>,
    fail: Mutex<bool>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_uploads(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> WorkflowResult<String> {
        if *self.fail.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(WorkflowError::Storage(format!(
                "injected failure uploading {bucket}/{key}"
            )));
        }
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                size_bytes: data.len(),
            });
        Ok(format!("memory://{bucket}/{key}"))
    }
}
