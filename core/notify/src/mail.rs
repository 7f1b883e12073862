//! Failure reports and the mail delivery seam.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use syncwarden_common::{format_duration, Error, Result, SyncResult, Task};

/// Timestamp layout used in report bodies.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-readable description of a failed task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub task_id: String,
    pub error: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub username: String,
    pub server_address: String,
    pub port: u16,
    pub remote_folder_path: String,
    pub local_folder_path: String,
    pub log_path: Option<PathBuf>,
}

impl FailureReport {
    /// Build a report from a task and the result of its run.
    pub fn new(task: &Task, result: &SyncResult) -> Self {
        Self {
            task_id: task.id.to_string(),
            error: result
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
            start_time: result.start_time,
            end_time: result.end_time,
            username: task.username.clone(),
            server_address: task.server_address.clone(),
            port: task.port,
            remote_folder_path: task.remote_folder_path.clone(),
            local_folder_path: task.local_folder_path.clone(),
            log_path: result.log_path.clone(),
        }
    }

    pub fn subject(&self) -> String {
        format!("Error during synchronization: {}", self.task_id)
    }

    pub fn body(&self) -> String {
        let log_file = self
            .log_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not written)".to_string());

        format!(
            "An error occurred during synchronization.\n\n\
             Error message: {}\n\n\
             Start time: {}\n\
             End time: {}\n\
             Duration: {}\n\n\
             Username: {}\n\
             Server address: {}\n\
             Port: {}\n\
             Remote folder: {}\n\
             Local folder: {}\n\n\
             Log file: {}\n",
            self.error,
            self.start_time.format(TIME_FORMAT),
            self.end_time.format(TIME_FORMAT),
            format_duration(self.end_time - self.start_time),
            self.username,
            self.server_address,
            self.port,
            self.remote_folder_path,
            self.local_folder_path,
            log_file,
        )
    }
}

/// Delivers a subject and body to the operator.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    /// - `Notification` with the delivery failure text
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Hands messages to an external mail-sending program.
///
/// The program is invoked as `<program> <args..> -s <subject> -t <body>` and
/// must exit with status 0 on success.
pub struct CommandMailer {
    program: String,
    args: Vec<String>,
}

impl CommandMailer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args..]` list.
    pub fn from_command_line(command: &[String]) -> Result<Self> {
        match command.split_first() {
            Some((program, args)) if !program.is_empty() => {
                Ok(Self::new(program.clone(), args.to_vec()))
            }
            _ => Err(Error::Config("mail command is empty".to_string())),
        }
    }
}

#[async_trait]
impl Mailer for CommandMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        debug!("Running mail command: {}", self.program);

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("-s")
            .arg(subject)
            .arg("-t")
            .arg(body)
            .output()
            .await
            .map_err(|e| {
                Error::Notification(format!("Failed to start '{}': {}", self.program, e))
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Notification(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

/// Used when no mail command is configured.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _subject: &str, _body: &str) -> Result<()> {
        Err(Error::Notification(
            "no mail command configured".to_string(),
        ))
    }
}
