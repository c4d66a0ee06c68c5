//! Wayfinder domain events.
//!
//! - [`EventKind`]: the closed set of change-request and import events.
//! - [`EventBus`]: `tokio::sync::broadcast` fan-out of [`WorkflowEvent`]s.
//! - [`EventAuditLog`]: background subscriber writing events to tracing.

pub mod audit;
pub mod bus;
pub mod kind;

pub use audit::EventAuditLog;
pub use bus::{EventBus, WorkflowEvent};
pub use kind::{EventKind, EventSubject};
