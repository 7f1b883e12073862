//! Liveness probe sent to an external monitoring endpoint.

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{info, warn};

use syncwarden_common::{Error, OrchestratorConfig, Result};

/// Upper bound for the whole heartbeat request.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a heartbeat send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatStatus {
    /// Heartbeats are switched off in the configuration.
    Disabled,
    /// The endpoint answered with 200.
    Sent,
    /// Any other status code, a timeout or a network error.
    Failed(String),
}

/// HTTP client for the liveness endpoint.
pub struct HeartbeatClient {
    http: Client,
}

impl HeartbeatClient {
    /// Create a client using the default heartbeat timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(HEARTBEAT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Notification(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Probe `url` once with a GET.
    pub async fn probe(&self, url: &str) -> HeartbeatStatus {
        match self.http.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                info!("Heartbeat signal sent successfully to {}.", url);
                HeartbeatStatus::Sent
            }
            Ok(response) => {
                let reason = format!("unexpected status {}", response.status().as_u16());
                warn!("Error sending heartbeat signal to {}: {}", url, reason);
                HeartbeatStatus::Failed(reason)
            }
            Err(e) if e.is_timeout() => {
                warn!("Timeout sending heartbeat signal to {}.", url);
                HeartbeatStatus::Failed("timed out".to_string())
            }
            Err(e) => {
                warn!("Error sending heartbeat signal to {}: {}", url, e);
                HeartbeatStatus::Failed(e.to_string())
            }
        }
    }

    /// Send the heartbeat if the configuration asks for one.
    pub async fn send(&self, config: &OrchestratorConfig) -> HeartbeatStatus {
        if !config.send_heartbeat {
            return HeartbeatStatus::Disabled;
        }
        self.probe(&config.heartbeat_link).await
    }
}
