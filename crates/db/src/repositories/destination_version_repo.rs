//! Repository for the append-only `destination_versions` ledger.
//!
//! Insert-only: rows are never updated or deleted.

use sqlx::PgPool;
use wayfinder_core::types::DbId;

use crate::models::destination_version::{CreateDestinationVersion, DestinationVersion};

/// Column list for destination_versions queries.
const COLUMNS: &str =
    "id, destination_id, version, change_request_id, action, snapshot, created_by, created_at";

/// Provides insert and read access to the version ledger.
pub struct DestinationVersionRepo;

impl DestinationVersionRepo {
    /// Append a ledger entry. `(destination_id, version)` is unique.
    pub async fn create(
        pool: &PgPool,
        input: &CreateDestinationVersion,
    ) -> Result<DestinationVersion, sqlx::Error> {
        let query = format!(
            "INSERT INTO destination_versions
                (destination_id, version, change_request_id, action, snapshot, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DestinationVersion>(&query)
            .bind(input.destination_id)
            .bind(input.version)
            .bind(input.change_request_id)
            .bind(input.action.as_str())
            .bind(&input.snapshot)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// All ledger entries for a destination in version order.
    pub async fn list_by_destination(
        pool: &PgPool,
        destination_id: DbId,
    ) -> Result<Vec<DestinationVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM destination_versions
             WHERE destination_id = $1
             ORDER BY version ASC"
        );
        sqlx::query_as::<_, DestinationVersion>(&query)
            .bind(destination_id)
            .fetch_all(pool)
            .await
    }

    /// Ledger entries written by one change request.
    pub async fn list_by_change_request(
        pool: &PgPool,
        change_request_id: DbId,
    ) -> Result<Vec<DestinationVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM destination_versions
             WHERE change_request_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, DestinationVersion>(&query)
            .bind(change_request_id)
            .fetch_all(pool)
            .await
    }
}
