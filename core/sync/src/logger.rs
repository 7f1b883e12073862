//! Durable run records: the shared fail log and one result log per task run.

use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use syncwarden_common::{format_duration, Result, TaskId};

/// Name of the append-only failure log inside the log directory.
pub const FAIL_LOG_FILENAME: &str = "fail.log";

/// Prefix shared by all per-run result logs.
pub const RESULT_LOG_PREFIX: &str = "logfile_";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes the log files of a run.
///
/// Safe to share between workers: fail-log appends are serialized, and
/// result logs are created exclusively so two runs never share a file.
pub struct SyncLogger {
    log_dir: PathBuf,
    fail_log: Mutex<()>,
}

impl SyncLogger {
    /// Create a logger writing into `log_dir`, creating it if needed.
    pub async fn new(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir).await?;

        Ok(Self {
            log_dir,
            fail_log: Mutex::new(()),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn fail_log_path(&self) -> PathBuf {
        self.log_dir.join(FAIL_LOG_FILENAME)
    }

    /// Append a timestamped line to the fail log.
    pub async fn log_error(&self, message: &str) -> Result<()> {
        let line = format!("[{}] {}\n", Local::now().format(TIME_FORMAT), message);

        let _guard = self.fail_log.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.fail_log_path())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Write the result log of one task run and return its path.
    ///
    /// The file is named after the task and the run start time; a numeric
    /// suffix is added when that name is already taken.
    pub async fn log_sync_result(
        &self,
        task_id: &TaskId,
        output: &str,
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
    ) -> Result<PathBuf> {
        let stem = format!(
            "{}{}_{}",
            RESULT_LOG_PREFIX,
            task_id,
            start_time.format("%Y%m%d_%H%M%S")
        );

        let mut suffix = 0u32;
        let (path, mut file) = loop {
            let name = if suffix == 0 {
                format!("{}.log", stem)
            } else {
                format!("{}_{}.log", stem, suffix)
            };
            let path = self.log_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        };

        let record = format!(
            "{}\nStart time: {}\nEnd time: {}\nDuration: {}\n",
            output,
            start_time.format(TIME_FORMAT),
            end_time.format(TIME_FORMAT),
            format_duration(end_time - start_time),
        );
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;

        Ok(path)
    }

    /// All result logs currently in the log directory, sorted by name.
    pub async fn result_logs(&self) -> Result<Vec<PathBuf>> {
        let mut logs = Vec::new();
        let mut entries = fs::read_dir(&self.log_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(RESULT_LOG_PREFIX) && name.ends_with(".log") {
                logs.push(entry.path());
            }
        }
        logs.sort();
        Ok(logs)
    }

    /// Lines currently in the fail log.
    pub async fn fail_log_lines(&self) -> Result<Vec<String>> {
        match fs::read_to_string(self.fail_log_path()).await {
            Ok(content) => Ok(content
                .lines()
                .filter(|line| line.starts_with('['))
                .map(String::from)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_log_dir() {
        let temp = TempDir::new().unwrap();
        let logger = SyncLogger::new(temp.path().join("log")).await.unwrap();
        assert!(logger.log_dir().is_dir());
        assert!(logger.fail_log_lines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_log_contents() {
        let temp = TempDir::new().unwrap();
        let logger = SyncLogger::new(temp.path()).await.unwrap();
        let id = TaskId::new("photos.json").unwrap();
        let start = Local::now();
        let end = start + chrono::Duration::seconds(61);

        let path = logger
            .log_sync_result(&id, "sent 1.2K bytes", start, end)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(
            name,
            format!("logfile_photos.json_{}.log", start.format("%Y%m%d_%H%M%S"))
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("sent 1.2K bytes\nStart time: "));
        assert!(content.contains("Duration: 0:01:01.000000"));
    }

    #[tokio::test]
    async fn test_same_start_second_gets_distinct_files() {
        let temp = TempDir::new().unwrap();
        let logger = SyncLogger::new(temp.path()).await.unwrap();
        let id = TaskId::new("photos.json").unwrap();
        let start = Local::now();

        let first = logger.log_sync_result(&id, "a", start, start).await.unwrap();
        let second = logger.log_sync_result(&id, "b", start, start).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(logger.result_logs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fail_log_appends() {
        let temp = TempDir::new().unwrap();
        let logger = Arc::new(SyncLogger::new(temp.path()).await.unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let logger = logger.clone();
                tokio::spawn(async move {
                    logger
                        .log_error(&format!("worker {} failed", i))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let lines = logger.fail_log_lines().await.unwrap();
        assert_eq!(lines.len(), 16);
        assert!(lines.iter().all(|l| l.ends_with("failed")));
    }
}
