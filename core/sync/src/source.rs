//! Task descriptors read from the tasks directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use syncwarden_common::{Error, Result, Task, TaskId};

/// Port used when a descriptor does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// On-disk form of one task, one JSON file per task.
///
/// Absent fields are kept empty rather than guessed, so a missing path
/// shows up as a failed task instead of a transfer to the wrong place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub server_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    /// File name of the private key below `~/.ssh`.
    #[serde(default)]
    pub private_key_name: Option<String>,
    #[serde(default)]
    pub remote_folder_path: Option<String>,
    #[serde(default)]
    pub local_folder_path: Option<String>,
    #[serde(default)]
    pub delete_remote_files: Option<bool>,
}

impl TaskFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Materialize the in-memory task, resolving the key inside `ssh_dir`.
    pub fn into_task(self, id: TaskId, ssh_dir: &Path) -> Task {
        Task {
            id,
            server_address: self.server_address.unwrap_or_default(),
            port: self.port.unwrap_or(DEFAULT_SSH_PORT),
            username: self.username.unwrap_or_default(),
            credential_path: ssh_dir.join(self.private_key_name.unwrap_or_default()),
            remote_folder_path: self.remote_folder_path.unwrap_or_default(),
            local_folder_path: self.local_folder_path.unwrap_or_default(),
            delete_remote_extraneous: self.delete_remote_files.unwrap_or(false),
        }
    }
}

/// Discovers tasks in a directory of `*.json` descriptors.
#[derive(Debug, Clone)]
pub struct TaskSource {
    tasks_dir: PathBuf,
    ssh_dir: PathBuf,
}

impl TaskSource {
    pub fn new(tasks_dir: impl Into<PathBuf>, ssh_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
            ssh_dir: ssh_dir.into(),
        }
    }

    /// Source resolving keys in the current user's `~/.ssh`.
    pub fn with_home_keys(tasks_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(tasks_dir, default_ssh_dir()?))
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    /// Load every task descriptor, sorted by file name.
    ///
    /// Unreadable or malformed descriptors are logged and skipped.
    ///
    /// # Errors
    /// - `Config` if the tasks directory does not exist
    pub fn load(&self) -> Result<Vec<Task>> {
        if !self.tasks_dir.is_dir() {
            return Err(Error::Config(format!(
                "Tasks directory '{}' not found",
                self.tasks_dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.tasks_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut tasks = Vec::with_capacity(files.len());
        for path in files {
            match self.load_file(&path) {
                Ok(task) => {
                    debug!("Loaded task '{}'", task.id);
                    tasks.push(task);
                }
                Err(e) => warn!("Skipping task file '{}': {}", path.display(), e),
            }
        }
        Ok(tasks)
    }

    /// Load a single descriptor; the task id is the file name.
    pub fn load_file(&self, path: &Path) -> Result<Task> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let id = TaskId::new(name)?;
        let content = std::fs::read_to_string(path)?;
        Ok(TaskFile::from_json(&content)?.into_task(id, &self.ssh_dir))
    }

    /// Write a descriptor as `<name>.json` and return its path.
    pub fn write_task(&self, name: &str, task: &TaskFile) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::TaskValidation(format!(
                "Invalid task file name '{}'",
                name
            )));
        }
        std::fs::create_dir_all(&self.tasks_dir)?;
        let file_name = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{}.json", name)
        };
        let path = self.tasks_dir.join(file_name);
        std::fs::write(&path, task.to_json()?)?;
        Ok(path)
    }
}

/// `<home>/.ssh` of the current user.
pub fn default_ssh_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".ssh"))
        .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))
}
