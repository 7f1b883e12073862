//! Common types shared across the SyncWarden crates.
//!
//! Task descriptors, attempt outcomes and run results live here so the
//! notification and sync crates agree on a single data model.

pub mod config;
pub mod error;
pub mod types;

pub use config::{OrchestratorConfig, CONFIG_FILENAME, LOG_DIR, TASKS_DIR};
pub use error::{Error, Result};
pub use types::{format_duration, RetryState, SyncAttemptOutcome, SyncResult, Task, TaskId};
