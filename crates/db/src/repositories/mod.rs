//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod change_request_repo;
pub mod destination_repo;
pub mod destination_version_repo;
pub mod import_job_repo;
pub mod import_row_repo;

pub use change_request_repo::ChangeRequestRepo;
pub use destination_repo::DestinationRepo;
pub use destination_version_repo::DestinationVersionRepo;
pub use import_job_repo::ImportJobRepo;
pub use import_row_repo::ImportRowRepo;
