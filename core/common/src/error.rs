//! Common error types for SyncWarden.

use thiserror::Error;

/// Top-level error type for SyncWarden operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Orchestrator configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A task descriptor violates its invariants.
    #[error("Invalid task: {0}")]
    TaskValidation(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Heartbeat or failure mail could not be delivered.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Child process could not be started or driven.
    #[error("Process error: {0}")]
    Process(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
