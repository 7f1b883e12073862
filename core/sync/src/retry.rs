//! Bounded retry with fixed backoff around a session runner.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use syncwarden_common::{OrchestratorConfig, RetryState, SyncAttemptOutcome, SyncResult, Task};
use syncwarden_notify::{FailureReport, NotificationDispatcher};

use crate::logger::SyncLogger;
use crate::session::SessionRunner;

/// Attempt budget and wait between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per task, including the first one.
    pub max_attempts: u32,
    /// Fixed wait after a retryable failure.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

/// Turns a task into a [`SyncResult`], driving logging and notification.
pub struct RetryEngine {
    runner: Arc<dyn SessionRunner>,
    logger: Arc<SyncLogger>,
    dispatcher: Arc<NotificationDispatcher>,
    policy: RetryPolicy,
}

impl RetryEngine {
    pub fn new(
        runner: Arc<dyn SessionRunner>,
        logger: Arc<SyncLogger>,
        dispatcher: Arc<NotificationDispatcher>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            runner,
            logger,
            dispatcher,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `task` to completion.
    ///
    /// Always returns a result. One result log is written per call; a failed
    /// run additionally appends to the fail log per failing attempt and
    /// sends one failure report.
    pub async fn run(&self, task: &Task) -> SyncResult {
        let start_time = Local::now();
        let mut state = RetryState::Pending;
        let mut attempts = 0u32;
        let mut output = String::new();
        let mut last_error = None;

        // An invalid task can never succeed, so it gets a single attempt.
        let invalid = task.validate().is_err();

        while !state.is_final() {
            state = RetryState::Attempting;
            attempts += 1;
            info!(
                "Starting attempt {} of {} for '{}'",
                attempts, self.policy.max_attempts, task.id
            );

            match self.runner.attempt(task).await {
                SyncAttemptOutcome::Success { output: captured } => {
                    info!(
                        "Files were synchronized between '{}' and '{}'",
                        task.remote_folder_path, task.local_folder_path
                    );
                    output = captured;
                    state = RetryState::Succeeded;
                }
                SyncAttemptOutcome::TerminalFailure { reason } => {
                    error!("{}: {}", task.id, reason);
                    self.record_failure(&reason).await;
                    last_error = Some(reason);
                    state = RetryState::TerminallyFailed;
                }
                SyncAttemptOutcome::RetryableFailure { reason } => {
                    warn!("{}: {}", task.id, reason);
                    self.record_failure(&reason).await;
                    last_error = Some(reason);

                    if invalid {
                        state = RetryState::TerminallyFailed;
                    } else if attempts >= self.policy.max_attempts {
                        state = RetryState::ExhaustedFailed;
                    } else {
                        state = RetryState::RetryWait;
                        info!(
                            "Retrying in {} seconds... (Attempt {} of {})",
                            self.policy.backoff.as_secs(),
                            attempts,
                            self.policy.max_attempts
                        );
                        sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        let end_time = Local::now();
        let log_path = match self
            .logger
            .log_sync_result(&task.id, &output, start_time, end_time)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to write result log for '{}': {}", task.id, e);
                None
            }
        };

        let result = SyncResult {
            task_id: task.id.clone(),
            success: state == RetryState::Succeeded,
            attempts,
            start_time,
            end_time,
            output,
            last_error,
            final_state: state,
            log_path,
        };

        if !result.success {
            error!(
                "Synchronization of '{}' failed after {} attempt(s) ({})",
                task.id, result.attempts, result.final_state
            );
            self.dispatcher
                .send_failure_report(&FailureReport::new(task, &result))
                .await;
        }

        result
    }

    async fn record_failure(&self, message: &str) {
        if let Err(e) = self.logger.log_error(message).await {
            error!("Failed to append to fail log: {}", e);
        }
    }
}
