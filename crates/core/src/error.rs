use crate::change_request::ChangeStatus;
use crate::types::DbId;
use crate::validation::ValidationError;

/// Domain error taxonomy shared by every layer above `core`.
///
/// Validation, state, not-found and policy failures are distinct variants so
/// callers can branch on them (retry an edit with a fresh version, surface a
/// conflict to a reviewer, audit a policy violation).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Change request {id} is not editable in status '{status}'")]
    NotEditable { id: DbId, status: ChangeStatus },

    #[error("Change request {id} is '{status}', expected '{expected}'")]
    InvalidChangeState {
        id: DbId,
        status: ChangeStatus,
        expected: ChangeStatus,
    },

    #[error("Change request {id} is at draft version {current}, not {expected}")]
    StaleVersion {
        id: DbId,
        expected: i32,
        current: i32,
    },

    #[error("Reviewer may not review their own change request {id}")]
    ReviewerConflict { id: DbId },

    #[error("Hard delete of destination {destination_id} is not allowed by policy")]
    HardDeleteNotAllowed { destination_id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a single-problem validation error.
    pub fn invalid(problem: impl Into<String>) -> Self {
        Self::Validation(ValidationError::single(problem))
    }
}
