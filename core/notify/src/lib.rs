//! SyncWarden notifications
//!
//! Side channels fired by the orchestrator:
//! - a liveness heartbeat sent once per run
//! - a failure report mailed for every task that ends in failure
//!
//! Delivery problems are logged and never escalate to the caller.

pub mod dispatcher;
pub mod heartbeat;
pub mod mail;

pub use dispatcher::NotificationDispatcher;
pub use heartbeat::{HeartbeatClient, HeartbeatStatus, HEARTBEAT_TIMEOUT};
pub use mail::{CommandMailer, DisabledMailer, FailureReport, Mailer};
