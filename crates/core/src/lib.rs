//! Pure domain logic for the destination change-request workflow.
//!
//! Nothing in this crate performs I/O. The DB, event and workflow crates
//! build on these types, validation rules and guards.

pub mod change_request;
pub mod destination;
pub mod error;
pub mod import;
pub mod media;
pub mod patch;
pub mod storage;
pub mod types;
pub mod validation;
