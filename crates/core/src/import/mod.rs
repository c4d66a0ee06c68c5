//! Pure pieces of the CSV bulk import pipeline.
//!
//! No DB, no async, no I/O:
//!
//! - [`csv`]: RFC 4180 tokenising with physical line tracking.
//! - [`row`]: required columns, row-to-payload mapping, in-batch slug tracking.
//! - [`tally`]: job/row statuses and the per-job counter accumulator.

pub mod csv;
pub mod row;
pub mod tally;

use crate::validation::ValidationError;

/// Default ceiling on the raw file size (5 MiB).
pub const DEFAULT_MAX_IMPORT_BYTES: u64 = 5 * 1024 * 1024;

/// Default ceiling on data rows per file.
pub const DEFAULT_MAX_IMPORT_ROWS: usize = 1000;

/// Default cap on change-request ids surfaced on a job.
pub const DEFAULT_MAX_PENDING_IDS: usize = 50;

/// Reject empty and oversized files before parsing.
pub fn check_import_size(size_bytes: u64, max_bytes: u64) -> Result<(), ValidationError> {
    if size_bytes == 0 {
        return Err(ValidationError::single("import file is empty"));
    }
    if size_bytes > max_bytes {
        return Err(ValidationError::single(format!(
            "import file is {size_bytes} bytes, exceeding the {max_bytes} byte limit"
        )));
    }
    Ok(())
}

/// Reject files with more data rows than the configured ceiling.
pub fn check_row_count(rows: usize, max_rows: usize) -> Result<(), ValidationError> {
    if rows > max_rows {
        Err(ValidationError::single(format!(
            "import file has {rows} rows, exceeding the {max_rows} row limit"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_oversized_files_are_rejected() {
        assert!(check_import_size(0, 100).is_err());
        assert!(check_import_size(101, 100).is_err());
        assert!(check_import_size(100, 100).is_ok());
    }

    #[test]
    fn row_ceiling_is_inclusive() {
        assert!(check_row_count(1000, 1000).is_ok());
        assert!(check_row_count(1001, 1000).is_err());
    }
}
