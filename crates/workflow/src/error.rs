use wayfinder_core::error::CoreError;
use wayfinder_core::validation::ValidationError;

/// Error type for workflow operations.
///
/// Domain outcomes (validation, state, not-found, policy) travel as
/// [`CoreError`]; the remaining variants are infrastructure failures that
/// are propagated unchanged and never retried here.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    /// `true` for failures of the subsystem itself rather than of the input.
    ///
    /// The import pipeline aborts the job on these and records everything
    /// else as a failed row.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            Self::Database(_) | Self::Storage(_) => true,
            Self::Core(CoreError::Internal(_)) => true,
            Self::Core(_) | Self::ImageProcessing(_) => false,
        }
    }
}

impl From<ValidationError> for WorkflowError {
    fn from(err: ValidationError) -> Self {
        Self::Core(CoreError::Validation(err))
    }
}

/// Translate a repository error, turning unique-constraint violations on
/// `uq_*` constraints into [`CoreError::Conflict`].
pub(crate) fn map_db_error(err: sqlx::Error) -> WorkflowError {
    if let sqlx::Error::Database(db_err) = &err {
        // PostgreSQL unique constraint violation: error code 23505
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ))
                .into();
            }
        }
    }
    WorkflowError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infrastructure_classification() {
        assert!(WorkflowError::Storage("bucket missing".into()).is_infrastructure());
        assert!(WorkflowError::Database(sqlx::Error::PoolTimedOut).is_infrastructure());
        assert!(WorkflowError::from(CoreError::Internal("bad status".into())).is_infrastructure());

        assert!(!WorkflowError::from(CoreError::invalid("name is required")).is_infrastructure());
        assert!(!WorkflowError::from(CoreError::ReviewerConflict { id: 1 }).is_infrastructure());
        assert!(!WorkflowError::ImageProcessing("corrupt".into()).is_infrastructure());
    }

    #[test]
    fn non_database_sqlx_errors_pass_through() {
        let err = map_db_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, WorkflowError::Database(sqlx::Error::RowNotFound)));
    }
}
