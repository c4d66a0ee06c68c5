//! CSV Bulk Import Pipeline.
//!
//! One call is one job. File-level problems (size, header, row ceiling) are
//! rejected before a job exists. After that every parsed record gets exactly
//! one row outcome; row problems are data, and only infrastructure failures
//! abort the loop, in which case the job is finalised as `failed`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use wayfinder_core::change_request::ChangeAction;
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::error::CoreError;
use wayfinder_core::import::csv::{parse_csv, CsvRecord};
use wayfinder_core::import::row::{map_record, missing_columns, BatchSlugs};
use wayfinder_core::import::tally::{ImportJobStatus, ImportRowStatus, ImportTally};
use wayfinder_core::import::{check_import_size, check_row_count};
use wayfinder_core::patch::Patch;
use wayfinder_core::storage::import_object_key;
use wayfinder_core::types::{DbId, UserId};
use wayfinder_core::validation::{validate_fields, FieldPolicy};
use wayfinder_db::models::import_job::{
    CreateImportJob, CreateImportRow, DestinationImportJob, DestinationImportRow, FinishImportJob,
};
use wayfinder_events::{EventBus, EventKind, WorkflowEvent};

use crate::config::ImportConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::{DestinationLookup, ImportStore, ObjectStorage};
use crate::service::ChangeWorkflow;

/// The finished job and its row outcomes in row order.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub job: DestinationImportJob,
    pub rows: Vec<DestinationImportRow>,
}

/// Drives the change-request workflow once per CSV row.
pub struct DestinationImporter {
    workflow: Arc<ChangeWorkflow>,
    lookup: Arc<dyn DestinationLookup>,
    imports: Arc<dyn ImportStore>,
    storage: Option<Arc<dyn ObjectStorage>>,
    events: Option<Arc<EventBus>>,
    config: ImportConfig,
}

/// Per-import memo of destination slug existence.
#[derive(Default)]
struct SlugCache {
    known: HashMap<String, bool>,
}

impl SlugCache {
    async fn exists(&mut self, lookup: &dyn DestinationLookup, slug: &str) -> WorkflowResult<bool> {
        if let Some(&exists) = self.known.get(slug) {
            return Ok(exists);
        }
        let exists = lookup.find_by_slug(slug).await?.is_some();
        self.known.insert(slug.to_string(), exists);
        Ok(exists)
    }
}

/// One row after mapping and checks, before it touches the workflow.
struct CheckedRow {
    row_number: i32,
    fields: DestinationFields,
    errors: Vec<String>,
}

impl DestinationImporter {
    pub fn new(
        workflow: Arc<ChangeWorkflow>,
        lookup: Arc<dyn DestinationLookup>,
        imports: Arc<dyn ImportStore>,
        config: ImportConfig,
    ) -> Self {
        Self {
            workflow,
            lookup,
            imports,
            storage: None,
            events: None,
            config,
        }
    }

    /// Archive raw files to `storage` before processing.
    pub fn with_object_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Import `data` on behalf of `uploader_id`.
    pub async fn import(
        &self,
        uploader_id: UserId,
        file_name: &str,
        data: Vec<u8>,
        dry_run: bool,
        notes: Option<String>,
    ) -> WorkflowResult<ImportOutcome> {
        check_import_size(data.len() as u64, self.config.max_file_bytes)?;
        let table = parse_csv(&data).map_err(CoreError::invalid)?;

        let missing = missing_columns(&table.headers);
        if !missing.is_empty() {
            return Err(CoreError::invalid(format!(
                "missing required columns: {}",
                missing.join(", ")
            ))
            .into());
        }
        check_row_count(table.records.len(), self.config.max_rows)?;

        let file_url = self.archive(uploader_id, file_name, data).await;
        let job = self
            .imports
            .create_job(&CreateImportJob {
                uploaded_by: uploader_id,
                file_name: file_name.to_string(),
                file_url,
                dry_run,
                notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                status: ImportJobStatus::Processing,
                total_rows: table.records.len() as i32,
            })
            .await?;

        tracing::info!(
            job_id = job.id,
            uploader_id,
            file_name,
            total_rows = job.total_rows,
            dry_run,
            "Destination import started"
        );

        let mut tally = ImportTally::new(self.config.max_pending_ids);
        let run = self
            .process_rows(&job, &table.headers, &table.records, &mut tally)
            .await;

        let finished = match run {
            Ok(()) => self.complete(&job, &tally).await,
            Err(err) => Err(err),
        };

        match finished {
            Ok(outcome) => {
                let job = &outcome.job;
                tracing::info!(
                    job_id = job.id,
                    processed_rows = job.processed_rows,
                    rows_failed = job.rows_failed,
                    changes_created = job.changes_created,
                    "Destination import completed"
                );
                self.publish(EventKind::ImportCompleted, job, json!({
                    "processed_rows": job.processed_rows,
                    "rows_failed": job.rows_failed,
                    "changes_created": job.changes_created,
                    "dry_run": job.dry_run,
                }));
                Ok(outcome)
            }
            Err(err) => {
                self.mark_failed(&job, &tally, &err).await;
                Err(err)
            }
        }
    }

    /// A job with its row outcomes.
    pub async fn get_job(&self, job_id: DbId) -> WorkflowResult<ImportOutcome> {
        let job = self.imports.find_job(job_id).await?.ok_or(CoreError::NotFound {
            entity: "DestinationImportJob",
            id: job_id,
        })?;
        let rows = self.imports.list_rows(job.id).await?;
        Ok(ImportOutcome { job, rows })
    }

    pub async fn list_jobs(&self, uploader_id: UserId) -> WorkflowResult<Vec<DestinationImportJob>> {
        self.imports.list_jobs_by_uploader(uploader_id).await
    }

    async fn process_rows(
        &self,
        job: &DestinationImportJob,
        headers: &[String],
        records: &[CsvRecord],
        tally: &mut ImportTally,
    ) -> WorkflowResult<()> {
        let mut batch = BatchSlugs::default();
        let mut existing = SlugCache::default();

        for record in records {
            let mut row = self
                .check_row(headers, record, &mut batch, &mut existing)
                .await?;

            let has_errors = !row.errors.is_empty();
            let mut change_id = None;
            if !has_errors && !job.dry_run {
                match self.propose(job.uploaded_by, row.fields.clone()).await {
                    Ok(id) => change_id = Some(id),
                    Err(err) if err.is_infrastructure() => return Err(err),
                    Err(err) => row.errors.push(err.to_string()),
                }
            }

            let has_errors = !row.errors.is_empty();
            let status = ImportRowStatus::decide(job.dry_run, has_errors);
            let error = has_errors.then(|| row.errors.join("; "));

            self.imports
                .insert_row(&CreateImportRow {
                    job_id: job.id,
                    row_number: row.row_number,
                    payload: row.fields,
                    action: ChangeAction::Create,
                    status,
                    change_id,
                    error,
                })
                .await?;

            tally.record(
                has_errors,
                change_id.filter(|_| status == ImportRowStatus::PendingReview),
            );
        }
        Ok(())
    }

    /// Map a record and collect every row-level problem.
    async fn check_row(
        &self,
        headers: &[String],
        record: &CsvRecord,
        batch: &mut BatchSlugs,
        existing: &mut SlugCache,
    ) -> WorkflowResult<CheckedRow> {
        let mapping = map_record(headers, &record.values);
        let mut errors = mapping.errors;
        let mut fields = mapping.fields.normalized();

        match fields.effective_slug() {
            Some(slug) => {
                fields.slug = Patch::Set(slug.clone());
                if let Err(owner) = batch.claim(&slug, record.line) {
                    errors.push(format!("slug '{slug}' duplicates row {owner}"));
                } else if existing.exists(self.lookup.as_ref(), &slug).await? {
                    errors.push(format!("slug '{slug}' already exists"));
                }
            }
            None => errors.push("slug is required".to_string()),
        }

        if fields.hero_image_url.as_set().is_none() {
            errors.push("hero_image_url is required".to_string());
        }

        if let Err(invalid) = validate_fields(ChangeAction::Create, &fields, true, self.field_policy()) {
            errors.extend(invalid.problems);
        }

        Ok(CheckedRow {
            row_number: record.line as i32,
            fields,
            errors,
        })
    }

    async fn complete(
        &self,
        job: &DestinationImportJob,
        tally: &ImportTally,
    ) -> WorkflowResult<ImportOutcome> {
        let job = self
            .imports
            .finish_job(job.id, &finish(ImportJobStatus::Completed, tally, None))
            .await?;
        let rows = self.imports.list_rows(job.id).await?;
        Ok(ImportOutcome { job, rows })
    }

    /// Finalise the job as `failed`. A job that cannot be finalised stays
    /// `processing` and is only logged.
    async fn mark_failed(&self, job: &DestinationImportJob, tally: &ImportTally, err: &WorkflowError) {
        let message = err.to_string();
        tracing::error!(job_id = job.id, error = %message, "Destination import failed");
        match self
            .imports
            .finish_job(
                job.id,
                &finish(ImportJobStatus::Failed, tally, Some(message.clone())),
            )
            .await
        {
            Ok(failed) => self.publish(EventKind::ImportFailed, &failed, json!({
                "processed_rows": failed.processed_rows,
                "error": message,
            })),
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Failed to mark import job as failed")
            }
        }
    }

    /// Create and immediately submit a draft for one row.
    async fn propose(&self, uploader_id: UserId, fields: DestinationFields) -> WorkflowResult<DbId> {
        let change = self
            .workflow
            .create_draft(uploader_id, ChangeAction::Create, None, fields)
            .await?;
        let submitted = self.workflow.submit_draft(change.id, uploader_id).await?;
        Ok(submitted.id)
    }

    /// Best-effort archive of the raw file. Failures only lose the link.
    async fn archive(&self, uploader_id: UserId, file_name: &str, data: Vec<u8>) -> Option<String> {
        let storage = self.storage.as_ref()?;
        let key = import_object_key(uploader_id, file_name);
        match storage
            .upload(&self.config.bucket, &key, "text/csv", data)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(uploader_id, key = %key, error = %e, "Failed to archive import file");
                None
            }
        }
    }

    fn field_policy(&self) -> &FieldPolicy {
        &self.workflow.policy().fields
    }

    fn publish(&self, kind: EventKind, job: &DestinationImportJob, payload: serde_json::Value) {
        if let Some(bus) = &self.events {
            bus.publish(WorkflowEvent::new(kind, job.id, job.uploaded_by).with_payload(payload));
        }
    }
}

fn finish(status: ImportJobStatus, tally: &ImportTally, error_message: Option<String>) -> FinishImportJob {
    FinishImportJob {
        status,
        processed_rows: tally.processed_rows,
        rows_failed: tally.rows_failed,
        changes_created: tally.changes_created,
        pending_change_ids: tally.pending_change_ids.clone(),
        error_message,
    }
}
