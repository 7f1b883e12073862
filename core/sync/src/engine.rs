//! Top-level orchestration of one run over all configured tasks.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use syncwarden_common::{OrchestratorConfig, Result, SyncResult, LOG_DIR, TASKS_DIR};
use syncwarden_notify::{HeartbeatStatus, NotificationDispatcher};

use crate::logger::SyncLogger;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;
use crate::retry::{RetryEngine, RetryPolicy};
use crate::session::{RsyncRunner, SessionRunner};
use crate::source::TaskSource;

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<SyncResult>,
    pub heartbeat: HeartbeatStatus,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Wires task discovery, the worker pool and the side channels together.
pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    source: TaskSource,
    logger: Arc<SyncLogger>,
    dispatcher: Arc<NotificationDispatcher>,
    runner: Arc<dyn SessionRunner>,
}

impl Orchestrator {
    /// Create an orchestrator for the layout below `base_dir`.
    ///
    /// Tasks are read from `base_dir/tasks`, logs go to `base_dir/log` and
    /// keys are resolved in the user's `~/.ssh`.
    pub async fn new(config: OrchestratorConfig, base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        config.validate()?;

        let source = TaskSource::with_home_keys(base_dir.join(TASKS_DIR))?;
        let logger = SyncLogger::new(base_dir.join(LOG_DIR)).await?;
        let dispatcher = NotificationDispatcher::from_config(&config)?;
        let runner = RsyncRunner::new().with_expect_timeout(config.expect_timeout());

        Ok(Self {
            config: Arc::new(config),
            source,
            logger: Arc::new(logger),
            dispatcher: Arc::new(dispatcher),
            runner: Arc::new(runner),
        })
    }

    /// Replace the session runner.
    pub fn with_runner(mut self, runner: Arc<dyn SessionRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the notification dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<NotificationDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Replace the task source.
    pub fn with_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }

    pub fn logger(&self) -> Arc<SyncLogger> {
        self.logger.clone()
    }

    /// Load all tasks and run them to completion.
    ///
    /// The heartbeat is sent concurrently with the workers. Only a failure to
    /// discover tasks is returned as an error; task failures are reported in
    /// the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let tasks = self.source.load()?;
        info!(
            "Loaded {} task(s) from {}",
            tasks.len(),
            self.source.tasks_dir().display()
        );

        let heartbeat = {
            let dispatcher = self.dispatcher.clone();
            let config = self.config.clone();
            tokio::spawn(async move { dispatcher.send_heartbeat(&config).await })
        };

        let engine = Arc::new(RetryEngine::new(
            self.runner.clone(),
            self.logger.clone(),
            self.dispatcher.clone(),
            RetryPolicy::from_config(&self.config),
        ));
        let queue = Arc::new(TaskQueue::from_tasks(tasks));
        let results = WorkerPool::new(queue, engine, self.config.num_threads)
            .run()
            .await;

        let heartbeat = heartbeat.await.unwrap_or_else(|e| {
            warn!("Heartbeat task failed: {}", e);
            HeartbeatStatus::Failed(e.to_string())
        });

        let summary = RunSummary { results, heartbeat };
        info!(
            "Run complete: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::tests::{RecordingMailer, Script, ScriptedRunner};
    use crate::source::TaskFile;
    use tempfile::TempDir;

    fn write_task(source: &TaskSource, name: &str) {
        let file = TaskFile {
            server_address: Some("files.example.org".to_string()),
            username: Some("mirror".to_string()),
            private_key_name: Some("mirror_key".to_string()),
            remote_folder_path: Some(format!("/export/{}", name)),
            local_folder_path: Some(format!("/mirror/{}", name)),
            ..Default::default()
        };
        source.write_task(name, &file).unwrap();
    }

    async fn orchestrator(
        temp: &TempDir,
        runner: ScriptedRunner,
        mailer: Arc<RecordingMailer>,
        num_threads: usize,
    ) -> Orchestrator {
        let config = OrchestratorConfig {
            num_threads,
            backoff_seconds: 0,
            ..Default::default()
        };
        let source = TaskSource::new(temp.path().join(TASKS_DIR), temp.path().join(".ssh"));
        let dispatcher = Arc::new(NotificationDispatcher::new(mailer).unwrap());

        Orchestrator::new(config, temp.path())
            .await
            .unwrap()
            .with_source(source)
            .with_runner(Arc::new(runner))
            .with_dispatcher(dispatcher)
    }

    #[tokio::test]
    async fn test_mixed_outcomes_end_to_end() {
        let temp = TempDir::new().unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let runner = ScriptedRunner::default()
            .with("b.json", Script::AlwaysFail)
            .with("c.json", Script::Prompt);
        let orchestrator = orchestrator(&temp, runner, mailer.clone(), 2).await;
        let source = TaskSource::new(temp.path().join(TASKS_DIR), temp.path().join(".ssh"));
        for name in ["a", "b", "c"] {
            write_task(&source, name);
        }

        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.heartbeat, HeartbeatStatus::Disabled);

        let attempts = |id: &str| {
            summary
                .results
                .iter()
                .find(|r| r.task_id.as_str() == id)
                .map(|r| r.attempts)
                .unwrap()
        };
        assert_eq!(attempts("a.json"), 1);
        assert_eq!(attempts("b.json"), 5);
        assert_eq!(attempts("c.json"), 1);

        let logger = orchestrator.logger();
        assert_eq!(logger.result_logs().await.unwrap().len(), 3);
        assert_eq!(logger.fail_log_lines().await.unwrap().len(), 6);

        let mut subjects = mailer.subjects().await;
        subjects.sort();
        assert_eq!(
            subjects,
            vec![
                "Error during synchronization: b.json",
                "Error during synchronization: c.json",
            ]
        );
    }

    #[tokio::test]
    async fn test_k_tasks_with_fewer_workers() {
        let temp = TempDir::new().unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let orchestrator = orchestrator(&temp, ScriptedRunner::default(), mailer, 3).await;
        let source = TaskSource::new(temp.path().join(TASKS_DIR), temp.path().join(".ssh"));
        for i in 0..10 {
            write_task(&source, &format!("job{}", i));
        }

        let summary = orchestrator.run().await.unwrap();

        assert_eq!(summary.results.len(), 10);
        assert_eq!(orchestrator.logger().result_logs().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_missing_tasks_dir_aborts() {
        let temp = TempDir::new().unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let orchestrator = orchestrator(&temp, ScriptedRunner::default(), mailer, 1).await;

        assert!(orchestrator.run().await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let config = OrchestratorConfig {
            num_threads: 0,
            ..Default::default()
        };
        assert!(Orchestrator::new(config, temp.path()).await.is_err());
    }
}
