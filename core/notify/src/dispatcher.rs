//! Stateless front for the heartbeat and failure-mail side channels.

use std::sync::Arc;
use tracing::{info, warn};

use syncwarden_common::{OrchestratorConfig, Result};

use crate::heartbeat::{HeartbeatClient, HeartbeatStatus};
use crate::mail::{CommandMailer, DisabledMailer, FailureReport, Mailer};

/// Sends the startup heartbeat and per-task failure reports.
///
/// Nothing here is retried and no failure is returned to the caller as an
/// error; outcomes are logged and reported as plain values.
pub struct NotificationDispatcher {
    heartbeat: HeartbeatClient,
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    /// Create a dispatcher delivering mail through `mailer`.
    pub fn new(mailer: Arc<dyn Mailer>) -> Result<Self> {
        Ok(Self {
            heartbeat: HeartbeatClient::new()?,
            mailer,
        })
    }

    /// Create a dispatcher from the orchestrator configuration.
    ///
    /// Without a `mail_command` failure reports are only logged.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let mailer: Arc<dyn Mailer> = match &config.mail_command {
            Some(command) => Arc::new(CommandMailer::from_command_line(command)?),
            None => Arc::new(DisabledMailer),
        };
        Self::new(mailer)
    }

    /// Send the liveness heartbeat if enabled.
    pub async fn send_heartbeat(&self, config: &OrchestratorConfig) -> HeartbeatStatus {
        self.heartbeat.send(config).await
    }

    /// Mail a failure report. Returns whether delivery succeeded.
    pub async fn send_failure_report(&self, report: &FailureReport) -> bool {
        match self.mailer.send(&report.subject(), &report.body()).await {
            Ok(()) => {
                info!("Failure report for '{}' sent successfully", report.task_id);
                true
            }
            Err(e) => {
                warn!("Failed to send failure report for '{}': {}", report.task_id, e);
                false
            }
        }
    }
}
