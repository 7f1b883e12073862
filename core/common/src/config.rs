//! Orchestrator configuration file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// Configuration file name in the base directory.
pub const CONFIG_FILENAME: &str = "backupconfig.json";

/// Directory holding one JSON descriptor per task.
pub const TASKS_DIR: &str = "tasks";

/// Directory receiving the fail log and the per-run result logs.
pub const LOG_DIR: &str = "log";

fn default_num_threads() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_seconds() -> u64 {
    30
}

/// Process-wide settings, loaded once and shared read-only by all workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Send a liveness probe at startup.
    #[serde(default)]
    pub send_heartbeat: bool,
    /// URL probed with a GET when `send_heartbeat` is set.
    #[serde(default)]
    pub heartbeat_link: String,
    /// Number of concurrent workers.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// Attempts per task before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    #[serde(default = "default_backoff_seconds")]
    pub backoff_seconds: u64,
    /// Abort an attempt that has not finished after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_timeout_seconds: Option<u64>,
    /// Program and leading arguments used to deliver failure mail.
    ///
    /// The subject and body are appended as `-s <subject> -t <body>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_command: Option<Vec<String>>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            send_heartbeat: false,
            heartbeat_link: String::new(),
            num_threads: default_num_threads(),
            max_attempts: default_max_attempts(),
            backoff_seconds: default_backoff_seconds(),
            expect_timeout_seconds: None,
            mail_command: None,
        }
    }
}

impl OrchestratorConfig {
    /// Load and validate the configuration at `path`.
    ///
    /// # Errors
    /// - `Config` if the file does not exist or fails validation
    /// - `Serialization` if the file is not valid JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "Configuration file '{}' not found",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::Config(
                "num_threads must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.send_heartbeat {
            url::Url::parse(&self.heartbeat_link).map_err(|e| {
                Error::Config(format!(
                    "Invalid heartbeat link '{}': {}",
                    self.heartbeat_link, e
                ))
            })?;
        }
        if let Some(command) = &self.mail_command {
            if command.first().map_or(true, |program| program.is_empty()) {
                return Err(Error::Config(
                    "mail_command must name a program".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Wait inserted between attempts.
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_seconds)
    }

    /// Per-attempt interaction timeout, if configured.
    pub fn expect_timeout(&self) -> Option<Duration> {
        self.expect_timeout_seconds.map(Duration::from_secs)
    }
}
