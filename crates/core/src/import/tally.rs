//! Import job and row statuses, and the counter accumulator threaded
//! through the row loop and written to the job once at the end.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ImportJobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Internal(format!(
                "Unknown import job status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportRowStatus {
    PendingReview,
    Skipped,
    Failed,
}

impl ImportRowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending_review" => Ok(Self::PendingReview),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Internal(format!(
                "Unknown import row status '{other}'"
            ))),
        }
    }

    /// Row status for a processed row.
    ///
    /// Dry runs skip every row; otherwise any problem fails the row.
    pub fn decide(dry_run: bool, has_errors: bool) -> Self {
        match (dry_run, has_errors) {
            (true, _) => Self::Skipped,
            (false, true) => Self::Failed,
            (false, false) => Self::PendingReview,
        }
    }
}

/// Per-job counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportTally {
    pub processed_rows: i32,
    pub rows_failed: i32,
    pub changes_created: i32,
    /// Created change ids surfaced on the job, capped at `max_pending_ids`.
    pub pending_change_ids: Vec<DbId>,
    #[serde(skip)]
    max_pending_ids: usize,
}

impl ImportTally {
    pub fn new(max_pending_ids: usize) -> Self {
        Self {
            max_pending_ids,
            ..Default::default()
        }
    }

    /// Account for one row outcome. `has_errors` counts toward
    /// `rows_failed` even on dry runs, where the row itself is skipped.
    pub fn record(&mut self, has_errors: bool, change_id: Option<DbId>) {
        self.processed_rows += 1;
        if has_errors {
            self.rows_failed += 1;
        }
        if let Some(id) = change_id {
            self.changes_created += 1;
            if self.pending_change_ids.len() < self.max_pending_ids {
                self.pending_change_ids.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_row_status() {
        assert_eq!(ImportRowStatus::decide(true, true), ImportRowStatus::Skipped);
        assert_eq!(ImportRowStatus::decide(true, false), ImportRowStatus::Skipped);
        assert_eq!(ImportRowStatus::decide(false, true), ImportRowStatus::Failed);
        assert_eq!(
            ImportRowStatus::decide(false, false),
            ImportRowStatus::PendingReview
        );
    }

    #[test]
    fn tally_counts_and_caps_pending_ids() {
        let mut tally = ImportTally::new(2);
        tally.record(false, Some(10));
        tally.record(true, None);
        tally.record(false, Some(11));
        tally.record(false, Some(12));

        assert_eq!(tally.processed_rows, 4);
        assert_eq!(tally.rows_failed, 1);
        assert_eq!(tally.changes_created, 3);
        assert_eq!(tally.pending_change_ids, vec![10, 11]);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ImportJobStatus::Queued,
            ImportJobStatus::Processing,
            ImportJobStatus::Completed,
            ImportJobStatus::Failed,
        ] {
            assert_eq!(ImportJobStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ImportRowStatus::parse("approved").is_err());
    }
}
