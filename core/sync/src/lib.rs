//! SyncWarden sync orchestrator
//!
//! This crate runs remote-folder synchronization tasks, including:
//! - Task discovery from a directory of JSON descriptors
//! - A drain-once task queue and a fixed-size worker pool
//! - Bounded retry with fixed backoff per task
//! - rsync attempts driven on a pseudo-terminal and classified by outcome
//! - Fail log and per-run result logs

pub mod engine;
pub mod logger;
pub mod pool;
pub mod queue;
pub mod retry;
pub mod session;
pub mod source;

// Re-export main types
pub use engine::{Orchestrator, RunSummary};
pub use logger::{SyncLogger, FAIL_LOG_FILENAME};
pub use pool::WorkerPool;
pub use queue::TaskQueue;
pub use retry::{RetryEngine, RetryPolicy};
pub use session::{classify, RsyncRunner, SessionEvent, SessionRunner, Transcript};
pub use source::{default_ssh_dir, TaskFile, TaskSource, DEFAULT_SSH_PORT};
