//! Repository for the `destination_change_requests` table.
//!
//! Every state-changing statement is guarded in its WHERE clause (status
//! and, for edits, `draft_version`) and uses `fetch_optional`, so a lost
//! race comes back as `None` rather than clobbering another writer.

use sqlx::types::Json;
use sqlx::PgPool;
use wayfinder_core::change_request::ChangeStatus;
use wayfinder_core::destination::DestinationFields;
use wayfinder_core::types::{DbId, UserId};

use crate::models::change_request::{ChangeRequest, CreateChangeRequest, ReviewDecision};

/// Column list for change request queries.
const COLUMNS: &str = "id, action, destination_id, payload, status, draft_version, \
    submitted_by, reviewed_by, submitted_at, reviewed_at, review_message, \
    published_version, created_at, updated_at";

/// Status filter shared by author-side edits.
const EDITABLE_STATUSES: &str = "('draft', 'rejected')";

/// Provides CRUD and guarded transitions for change requests.
pub struct ChangeRequestRepo;

impl ChangeRequestRepo {
    /// Insert a new draft at `draft_version = 1`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateChangeRequest,
    ) -> Result<ChangeRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO destination_change_requests
                (action, destination_id, payload, status, draft_version, submitted_by)
             VALUES ($1, $2, $3, 'draft', 1, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(input.action.as_str())
            .bind(input.destination_id)
            .bind(Json(&input.payload))
            .bind(input.submitted_by)
            .fetch_one(pool)
            .await
    }

    /// Find a change request by id.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM destination_change_requests WHERE id = $1");
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List change requests, optionally filtered by status, oldest first.
    pub async fn list_by_status(
        pool: &PgPool,
        status: Option<ChangeStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM destination_change_requests
             WHERE ($1::TEXT IS NULL OR status = $1)
             ORDER BY created_at ASC, id ASC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(status.map(ChangeStatus::as_str))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// List every change request authored by a user, newest first.
    pub async fn list_by_author(
        pool: &PgPool,
        author_id: UserId,
    ) -> Result<Vec<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM destination_change_requests
             WHERE submitted_by = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(author_id)
            .fetch_all(pool)
            .await
    }

    /// Replace the draft payload and bump `draft_version`.
    ///
    /// Compare-and-swap on `expected_draft_version` and an editable status.
    pub async fn update_draft(
        pool: &PgPool,
        id: DbId,
        expected_draft_version: i32,
        payload: &DestinationFields,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE destination_change_requests
             SET payload = $3, draft_version = draft_version + 1, updated_at = NOW()
             WHERE id = $1 AND draft_version = $2 AND status IN {EDITABLE_STATUSES}
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .bind(expected_draft_version)
            .bind(Json(payload))
            .fetch_optional(pool)
            .await
    }

    /// Move an editable request to `pending_review`, stamping `submitted_at`
    /// and clearing any earlier review outcome.
    pub async fn submit(pool: &PgPool, id: DbId) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE destination_change_requests
             SET status = 'pending_review', submitted_at = NOW(),
                 reviewed_by = NULL, reviewed_at = NULL, review_message = NULL,
                 updated_at = NOW()
             WHERE id = $1 AND status IN {EDITABLE_STATUSES}
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Status compare-and-swap for reviewer decisions.
    ///
    /// `reviewed_at` is stamped when a reviewer is recorded and cleared
    /// otherwise (releasing an approval claim).
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        decision: &ReviewDecision,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE destination_change_requests
             SET status = $3, reviewed_by = $4,
                 reviewed_at = CASE WHEN $4::BIGINT IS NULL THEN NULL ELSE NOW() END,
                 review_message = $5, updated_at = NOW()
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .bind(decision.from.as_str())
            .bind(decision.to.as_str())
            .bind(decision.reviewer_id)
            .bind(&decision.message)
            .fetch_optional(pool)
            .await
    }

    /// Record the destination and version an approval produced.
    pub async fn set_published(
        pool: &PgPool,
        id: DbId,
        destination_id: DbId,
        published_version: i32,
    ) -> Result<Option<ChangeRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE destination_change_requests
             SET destination_id = $2, published_version = $3, updated_at = NOW()
             WHERE id = $1 AND status = 'approved'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeRequest>(&query)
            .bind(id)
            .bind(destination_id)
            .bind(published_version)
            .fetch_optional(pool)
            .await
    }
}
