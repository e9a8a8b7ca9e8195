//! Configuration for the editing service and the polling loop.
//!
//! Configuration is a plain value handed to [`EditClient`](crate::client::EditClient)
//! at construction. [`EditServiceConfig::from_env`] is the only code that
//! reads the process environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{Result, StagemergeError};

/// Environment variable holding the service credential.
pub const API_KEY_ENV: &str = "BFL_API_KEY";

/// Environment variable overriding the submission endpoint.
pub const ENDPOINT_ENV: &str = "BFL_ENDPOINT";

/// Default submission endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.bfl.ai/v1/flux-kontext-pro";

/// Configuration for the remote editing service.
#[derive(Clone, Serialize, Deserialize)]
pub struct EditServiceConfig {
    /// Credential sent in the `x-key` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Submission endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
    /// Polling behaviour.
    #[serde(default)]
    pub poll: PollConfig,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout() -> f64 {
    60.0
}

impl Default for EditServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            request_timeout_seconds: default_request_timeout(),
            poll: PollConfig::default(),
        }
    }
}

// The key must never end up in logs.
impl std::fmt::Debug for EditServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditServiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("poll", &self.poll)
            .finish()
    }
}

impl EditServiceConfig {
    /// Creates a configuration with defaults and no credential.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from the environment.
    ///
    /// Loads a `.env` file from the working directory when present, then
    /// reads [`API_KEY_ENV`] and [`ENDPOINT_ENV`]. A missing key is not an
    /// error here; submission fails with an auth error instead.
    #[must_use]
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Failed to load .env file");
            }
        }

        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()),
            endpoint: std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| default_endpoint()),
            ..Self::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the submission endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, seconds: f64) -> Self {
        self.request_timeout_seconds = seconds;
        self
    }

    /// Sets the polling configuration.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Gets the request timeout as a Duration.
    ///
    /// Fails for zero, negative, non-finite or out-of-range values.
    pub fn request_timeout(&self) -> Result<Duration> {
        let seconds = self.request_timeout_seconds;
        Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| {
                StagemergeError::Config(format!(
                    "request_timeout_seconds must be a positive number of seconds, got {seconds}"
                ))
            })
    }
}

/// Timing of the status polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between status queries while the job is pending.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Delay after a status query that failed at the transport level.
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Upper bound on the total wait for one job.
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
}

fn default_interval_ms() -> u64 {
    500
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_max_wait_seconds() -> u64 {
    300
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl PollConfig {
    /// Creates a new poll configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pending interval.
    #[must_use]
    pub fn with_interval_ms(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    /// Sets the transient-error backoff.
    #[must_use]
    pub fn with_error_backoff_ms(mut self, ms: u64) -> Self {
        self.error_backoff_ms = ms;
        self
    }

    /// Sets the deadline in seconds.
    #[must_use]
    pub fn with_max_wait_seconds(mut self, seconds: u64) -> Self {
        self.max_wait_seconds = seconds;
        self
    }

    /// Delay between pending polls.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Delay after a failed status query.
    #[must_use]
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Default deadline for one job.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditServiceConfig::default();
        assert!(config.api_key.is_none());
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.poll.interval(), Duration::from_millis(500));
        assert_eq!(config.poll.error_backoff(), Duration::from_secs(1));
        assert_eq!(config.poll.max_wait(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: EditServiceConfig =
            serde_json::from_str(r#"{"api_key": "k", "poll": {"interval_ms": 50}}"#).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.poll.interval_ms, 50);
        assert_eq!(config.poll.error_backoff_ms, 1000);
        assert_eq!(config.poll.max_wait_seconds, 300);
    }

    #[test]
    fn test_builder() {
        let config = EditServiceConfig::new()
            .with_api_key("secret")
            .with_endpoint("http://localhost:9000/edit")
            .with_request_timeout(5.0)
            .with_poll(PollConfig::new().with_interval_ms(10).with_max_wait_seconds(2));

        assert_eq!(config.endpoint, "http://localhost:9000/edit");
        assert_eq!(config.request_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.poll.max_wait(), Duration::from_secs(2));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = EditServiceConfig::new().with_api_key("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_unusable_request_timeout_is_config_error() {
        let negative: EditServiceConfig =
            serde_json::from_str(r#"{"api_key": "k", "request_timeout_seconds": -1}"#).unwrap();
        let err = negative.request_timeout().unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Config);
        assert!(err.to_string().contains("-1"));

        for seconds in [0.0, f64::NAN, f64::INFINITY, 1e30] {
            let config = EditServiceConfig::new().with_request_timeout(seconds);
            assert!(config.request_timeout().is_err(), "accepted {seconds}");
        }
    }
}
