//! Common types used throughout SyncWarden.

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier of a task, derived from the name of its descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Create a new TaskId from a string.
    ///
    /// # Errors
    /// - Returns error if id is empty
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::TaskValidation(
                "TaskId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One remote-to-local folder synchronization target.
///
/// Tasks are built once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Identity of the task (descriptor file name).
    pub id: TaskId,
    /// Remote host name or address.
    pub server_address: String,
    /// SSH port of the remote host.
    pub port: u16,
    /// Login name on the remote host.
    pub username: String,
    /// Private key handed to ssh with `-i`.
    pub credential_path: PathBuf,
    /// Source folder on the remote host.
    pub remote_folder_path: String,
    /// Destination folder on this machine.
    pub local_folder_path: String,
    /// Delete files that exist only on the receiving side.
    pub delete_remote_extraneous: bool,
}

impl Task {
    /// Check the path invariants of the task.
    ///
    /// # Errors
    /// - Returns `TaskValidation` if the remote or local path is empty
    pub fn validate(&self) -> crate::Result<()> {
        if self.remote_folder_path.trim().is_empty() || self.local_folder_path.trim().is_empty() {
            return Err(crate::Error::TaskValidation(
                "Remote or local folder path is empty.".to_string(),
            ));
        }
        Ok(())
    }

    /// `user@host:path` source specification for the transfer tool.
    pub fn remote_spec(&self) -> String {
        format!(
            "{}@{}:{}",
            self.username, self.server_address, self.remote_folder_path
        )
    }
}

/// Classified result of a single synchronization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAttemptOutcome {
    /// The transfer tool exited cleanly.
    Success { output: String },
    /// The attempt failed but another attempt may succeed.
    RetryableFailure { reason: String },
    /// The attempt failed in a way that retrying cannot fix.
    TerminalFailure { reason: String },
}

impl SyncAttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncAttemptOutcome::Success { .. })
    }

    /// Failure text, if this outcome is a failure.
    pub fn reason(&self) -> Option<&str> {
        match self {
            SyncAttemptOutcome::Success { .. } => None,
            SyncAttemptOutcome::RetryableFailure { reason }
            | SyncAttemptOutcome::TerminalFailure { reason } => Some(reason),
        }
    }
}

/// States of the per-task retry machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryState {
    Pending,
    Attempting,
    RetryWait,
    Succeeded,
    /// Stopped on a failure that must not be retried.
    TerminallyFailed,
    /// Ran out of attempts.
    ExhaustedFailed,
}

impl RetryState {
    /// Whether the machine has stopped.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            RetryState::Succeeded | RetryState::TerminallyFailed | RetryState::ExhaustedFailed
        )
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetryState::Pending => "pending",
            RetryState::Attempting => "attempting",
            RetryState::RetryWait => "retry-wait",
            RetryState::Succeeded => "succeeded",
            RetryState::TerminallyFailed => "terminally-failed",
            RetryState::ExhaustedFailed => "exhausted",
        };
        f.write_str(name)
    }
}

/// Final record of one task run.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub task_id: TaskId,
    pub success: bool,
    /// Number of attempts that were started.
    pub attempts: u32,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// Captured transfer output of the successful attempt.
    pub output: String,
    pub last_error: Option<String>,
    pub final_state: RetryState,
    /// Result log written for this run, if writing it succeeded.
    pub log_path: Option<PathBuf>,
}

impl SyncResult {
    /// Wall-clock time between start and end of the run.
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Render a duration as `H:MM:SS.ffffff`.
pub fn format_duration(duration: Duration) -> String {
    let total_micros = duration.num_microseconds().unwrap_or(i64::MAX).max(0);
    let secs = total_micros / 1_000_000;
    let micros = total_micros % 1_000_000;
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        micros
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: TaskId::new("nas.json").unwrap(),
            server_address: "nas.local".to_string(),
            port: 22,
            username: "backup".to_string(),
            credential_path: PathBuf::from("/home/backup/.ssh/nas"),
            remote_folder_path: "/srv/photos".to_string(),
            local_folder_path: "/mnt/photos".to_string(),
            delete_remote_extraneous: false,
        }
    }

    #[test]
    fn test_task_id_empty_fails() {
        assert!(TaskId::new("").is_err());
    }

    #[test]
    fn test_task_validate() {
        assert!(sample_task().validate().is_ok());

        let mut task = sample_task();
        task.local_folder_path = String::new();
        assert!(matches!(
            task.validate(),
            Err(crate::Error::TaskValidation(_))
        ));

        let mut task = sample_task();
        task.remote_folder_path = "  ".to_string();
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_remote_spec() {
        assert_eq!(sample_task().remote_spec(), "backup@nas.local:/srv/photos");
    }

    #[test]
    fn test_outcome_reason() {
        let ok = SyncAttemptOutcome::Success {
            output: "done".to_string(),
        };
        assert!(ok.is_success());
        assert_eq!(ok.reason(), None);

        let failed = SyncAttemptOutcome::TerminalFailure {
            reason: "prompt".to_string(),
        };
        assert_eq!(failed.reason(), Some("prompt"));
    }

    #[test]
    fn test_final_states() {
        assert!(RetryState::Succeeded.is_final());
        assert!(RetryState::ExhaustedFailed.is_final());
        assert!(!RetryState::RetryWait.is_final());
    }

    #[test]
    fn test_format_duration() {
        let d = Duration::seconds(3725) + Duration::microseconds(42);
        assert_eq!(format_duration(d), "1:02:05.000042");
        assert_eq!(format_duration(Duration::zero()), "0:00:00.000000");
    }

    proptest::proptest! {
        #[test]
        fn prop_task_id_preserves_name(name in "[a-zA-Z0-9_.-]{1,40}") {
            let id = TaskId::new(name.clone()).unwrap();
            proptest::prop_assert_eq!(id.as_str(), name.as_str());
            proptest::prop_assert_eq!(id.to_string(), name);
        }
    }
}
