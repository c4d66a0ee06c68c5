/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Contributors and reviewers are identified by the id issued by the
/// external auth service.
pub type UserId = DbId;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
