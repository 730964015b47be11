//! Delivery of integrity events to the recording backend.
//!
//! The backend stores each event against its interview and relays it to
//! the interviewer. Delivery is best effort: failures are logged and
//! counted, never retried in a loop and never surfaced to the stream.

use crate::core::event::ProctorEvent;
use std::time::Duration;

/// Recording backend configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Base URL, e.g. `http://localhost:3001`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RecorderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Endpoint that accepts events for one interview.
    pub fn events_url(&self, interview_id: &str) -> String {
        format!("{}/api/events/{}", self.base_url, interview_id)
    }

    /// Get the health check endpoint URL.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

/// Recorder client error types.
#[derive(Debug)]
pub enum RecorderError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Backend returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::Config(msg) => write!(f, "Recorder config error: {msg}"),
            RecorderError::Network(msg) => write!(f, "Recorder network error: {msg}"),
            RecorderError::Server { status, message } => {
                write!(f, "Recorder server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for RecorderError {}

/// Outcome of delivering one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: u64,
    pub failed: u64,
}

/// HTTP client for the recording backend.
#[cfg(feature = "recorder")]
#[derive(Clone)]
pub struct RecorderClient {
    config: RecorderConfig,
    client: reqwest::Client,
    agent_id: String,
}

#[cfg(feature = "recorder")]
impl RecorderClient {
    /// Create a new recorder client.
    pub fn new(config: RecorderConfig) -> Result<Self, RecorderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RecorderError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Generate agent ID from hostname + instance
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let agent_id = format!(
            "proctor-{}-{}",
            hostname,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Ok(Self {
            config,
            client,
            agent_id,
        })
    }

    /// Test connection to the backend.
    pub async fn test_connection(&self) -> Result<bool, RecorderError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| RecorderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Post a single event.
    pub async fn send_event(
        &self,
        interview_id: &str,
        event: &ProctorEvent,
    ) -> Result<(), RecorderError> {
        let response = self
            .client
            .post(self.config.events_url(interview_id))
            .header("X-Proctor-Agent", &self.agent_id)
            .json(event)
            .send()
            .await
            .map_err(|e| RecorderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecorderError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Deliver a batch one event at a time, logging failures.
    pub async fn deliver(&self, interview_id: &str, events: &[ProctorEvent]) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for event in events {
            match self.send_event(interview_id, event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        interview_id,
                        event_type = %event.event_type,
                        "Failed to deliver event: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Get the agent ID.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}
