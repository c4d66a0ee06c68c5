//! Repository for the insert-only `destination_import_rows` table.

use sqlx::types::Json;
use sqlx::PgPool;
use wayfinder_core::types::DbId;

use crate::models::import_job::{CreateImportRow, DestinationImportRow};

/// Column list for import row queries.
const COLUMNS: &str =
    "id, job_id, row_number, payload, action, status, change_id, error, created_at";

/// Provides insert and read access to per-row import outcomes.
pub struct ImportRowRepo;

impl ImportRowRepo {
    /// Insert one row outcome.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImportRow,
    ) -> Result<DestinationImportRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO destination_import_rows
                (job_id, row_number, payload, action, status, change_id, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DestinationImportRow>(&query)
            .bind(input.job_id)
            .bind(input.row_number)
            .bind(Json(&input.payload))
            .bind(input.action.as_str())
            .bind(input.status.as_str())
            .bind(input.change_id)
            .bind(&input.error)
            .fetch_one(pool)
            .await
    }

    /// Row outcomes of a job in row order.
    pub async fn list_by_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<DestinationImportRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM destination_import_rows
             WHERE job_id = $1
             ORDER BY row_number ASC"
        );
        sqlx::query_as::<_, DestinationImportRow>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
