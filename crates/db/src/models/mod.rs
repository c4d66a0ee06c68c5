//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts
//! - Accessors parsing text status/action columns into `wayfinder_core` enums

pub mod change_request;
pub mod destination;
pub mod destination_version;
pub mod import_job;
