//! Repository for the `destination_import_jobs` table.

use sqlx::PgPool;
use wayfinder_core::types::{DbId, UserId};

use crate::models::import_job::{CreateImportJob, DestinationImportJob, FinishImportJob};

/// Column list for import job queries.
const COLUMNS: &str = "id, uploaded_by, file_name, file_url, dry_run, notes, status, \
    total_rows, processed_rows, rows_failed, changes_created, pending_change_ids, \
    error_message, started_at, completed_at, created_at, updated_at";

/// Provides CRUD operations for import jobs.
pub struct ImportJobRepo;

impl ImportJobRepo {
    /// Insert a job. `started_at` is stamped when it starts out `processing`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImportJob,
    ) -> Result<DestinationImportJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO destination_import_jobs
                (uploaded_by, file_name, file_url, dry_run, notes, status, total_rows, started_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7,
                     CASE WHEN $6 = 'processing' THEN NOW() ELSE NULL END)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DestinationImportJob>(&query)
            .bind(input.uploaded_by)
            .bind(&input.file_name)
            .bind(&input.file_url)
            .bind(input.dry_run)
            .bind(&input.notes)
            .bind(input.status.as_str())
            .bind(input.total_rows)
            .fetch_one(pool)
            .await
    }

    /// Find a job by id.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<DestinationImportJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM destination_import_jobs WHERE id = $1");
        sqlx::query_as::<_, DestinationImportJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Jobs uploaded by a user, newest first.
    pub async fn list_by_uploader(
        pool: &PgPool,
        uploaded_by: UserId,
    ) -> Result<Vec<DestinationImportJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM destination_import_jobs
             WHERE uploaded_by = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, DestinationImportJob>(&query)
            .bind(uploaded_by)
            .fetch_all(pool)
            .await
    }

    /// Write the final status and counters and stamp `completed_at`.
    pub async fn finish(
        pool: &PgPool,
        id: DbId,
        input: &FinishImportJob,
    ) -> Result<Option<DestinationImportJob>, sqlx::Error> {
        let query = format!(
            "UPDATE destination_import_jobs
             SET status = $2, processed_rows = $3, rows_failed = $4, changes_created = $5,
                 pending_change_ids = $6, error_message = $7,
                 completed_at = NOW(), updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DestinationImportJob>(&query)
            .bind(id)
            .bind(input.status.as_str())
            .bind(input.processed_rows)
            .bind(input.rows_failed)
            .bind(input.changes_created)
            .bind(&input.pending_change_ids)
            .bind(&input.error_message)
            .fetch_optional(pool)
            .await
    }
}
