//! Destination change-request workflow engine.
//!
//! - [`ChangeWorkflow`]: the draft / review / publish state machine, the
//!   approval applier behind it and media attachment.
//! - [`DestinationImporter`]: CSV bulk import driving the state machine
//!   once per row.
//! - [`ports`]: the storage, object-storage and image collaborators, with
//!   PostgreSQL ([`pg`]), local/S3 ([`storage`]) and `image`-based
//!   ([`imaging`]) implementations. In-memory stores with failure switches
//!   live in `memory`, behind the `test-support` feature.

mod applier;
pub mod config;
pub mod error;
pub mod imaging;
pub mod import;
pub mod media;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod pg;
pub mod ports;
pub mod service;
pub mod storage;

pub use config::{ImportConfig, MediaConfig, StorageConfig, WorkflowConfig, WorkflowPolicy};
pub use error::{WorkflowError, WorkflowResult};
pub use import::{DestinationImporter, ImportOutcome};
pub use media::{StoredMedia, Upload};
pub use service::ChangeWorkflow;
