//! Error types for stagemerge.
//!
//! Every failure the engine can surface maps onto one [`ErrorKind`], so the
//! layer calling into the pipeline can translate errors into responses
//! without inspecting messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::PipelineRun;

/// Convenience alias used throughout the crate.
pub type Result<T, E = StagemergeError> = std::result::Result<T, E>;

/// Stable classification of [`StagemergeError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A local image file is missing.
    NotFound,
    /// Image bytes could not be decoded.
    Decode,
    /// An image could not be encoded for transport or storage.
    Encode,
    /// No credential is configured.
    Auth,
    /// A request did not complete with a success status.
    Transport,
    /// A success response was missing expected fields.
    Protocol,
    /// The remote job reported a terminal failure.
    RemoteFailure,
    /// The polling deadline elapsed.
    Timeout,
    /// A local write or directory operation failed.
    Io,
    /// A configuration value is out of range.
    Config,
    /// A composite would exceed the canvas size limit.
    TooLarge,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Decode => "decode",
            Self::Encode => "encode",
            Self::Auth => "auth",
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::RemoteFailure => "remote_failure",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Config => "config",
            Self::TooLarge => "too_large",
        };
        f.write_str(s)
    }
}

/// The main error type for stagemerge operations.
#[derive(Debug, Error)]
pub enum StagemergeError {
    /// The referenced image does not exist on local storage.
    #[error("Image not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The bytes at `path` are not a decodable image.
    #[error("Failed to decode image {}: {reason}", path.display())]
    Decode {
        /// The offending path.
        path: PathBuf,
        /// Decoder message.
        reason: String,
    },

    /// Re-encoding an image failed.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// No API credential was configured.
    #[error("API key is required; set BFL_API_KEY or configure api_key")]
    Auth,

    /// The remote endpoint answered with a non-success status.
    #[error("Request failed with status {status}: {body}")]
    Transport {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The request never produced a response (DNS, TLS, connection, timeout).
    #[error("HTTP request failed: {0}")]
    Network(String),

    /// A success response did not carry the fields the contract requires.
    #[error("Unexpected response from editing service: {0}")]
    Protocol(String),

    /// The remote job reached a terminal failure state.
    #[error("Remote job {job_id} failed with status '{status}': {details}")]
    RemoteFailure {
        /// Service-issued job id.
        job_id: String,
        /// Raw status string reported by the service.
        status: String,
        /// Serialized response body.
        details: String,
    },

    /// The job did not reach a terminal state before the deadline.
    #[error("Job {job_id} did not complete within {}s", waited.as_secs_f64())]
    Timeout {
        /// Service-issued job id.
        job_id: String,
        /// The deadline that elapsed.
        waited: Duration,
    },

    /// IO error while writing results.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value cannot be used.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Two sources would produce a canvas over the pixel limit.
    #[error("Composite canvas {width}x{height} exceeds the limit of {max_pixels} pixels")]
    CanvasTooLarge {
        /// Requested canvas width.
        width: u64,
        /// Requested canvas height.
        height: u32,
        /// Largest allowed `width * height`.
        max_pixels: u64,
    },
}

impl StagemergeError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol(reason.into())
    }

    /// Returns the stable kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Auth => ErrorKind::Auth,
            Self::Transport { .. } | Self::Network(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::RemoteFailure { .. } => ErrorKind::RemoteFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
            Self::CanvasTooLarge { .. } => ErrorKind::TooLarge,
        }
    }

    /// Whether a status query that failed this way may be retried.
    ///
    /// Only transport-level failures qualify. A job that reports failure is
    /// never transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Network(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::NotFound { path } | Self::Decode { path, .. } => {
                map.insert("path".to_string(), serde_json::json!(path.display().to_string()));
            }
            Self::Transport { status, .. } => {
                map.insert("status".to_string(), serde_json::json!(status));
            }
            Self::RemoteFailure { job_id, status, .. } => {
                map.insert("job_id".to_string(), serde_json::json!(job_id));
                map.insert("status".to_string(), serde_json::json!(status));
            }
            Self::Timeout { job_id, waited } => {
                map.insert("job_id".to_string(), serde_json::json!(job_id));
                map.insert("waited_seconds".to_string(), serde_json::json!(waited.as_secs_f64()));
            }
            Self::CanvasTooLarge {
                width,
                height,
                max_pixels,
            } => {
                map.insert("width".to_string(), serde_json::json!(width));
                map.insert("height".to_string(), serde_json::json!(height));
                map.insert("max_pixels".to_string(), serde_json::json!(max_pixels));
            }
            _ => {}
        }

        map
    }
}

impl From<reqwest::Error> for StagemergeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Transport {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None if err.is_decode() => Self::Protocol(err.to_string()),
            None => Self::Network(err.to_string()),
        }
    }
}

/// A pipeline run that stopped before reaching `Done`.
///
/// Carries the error that halted the run together with the run record, whose
/// outputs keep every stage result produced before the failure.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed: {error}")]
pub struct PipelineFailure {
    /// Name of the stage that failed, or `validate` for input checks.
    pub stage: String,
    /// The underlying error.
    #[source]
    pub error: StagemergeError,
    /// The partial run, including outputs gathered so far.
    pub run: Box<PipelineRun>,
}

impl PipelineFailure {
    /// Creates a new pipeline failure.
    #[must_use]
    pub fn new(stage: impl Into<String>, error: StagemergeError, run: PipelineRun) -> Self {
        Self {
            stage: stage.into(),
            error,
            run: Box::new(run),
        }
    }

    /// Returns the kind of the underlying error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(StagemergeError::not_found("/x.jpg").kind(), ErrorKind::NotFound);
        assert_eq!(StagemergeError::Auth.kind(), ErrorKind::Auth);
        assert_eq!(
            StagemergeError::Network("refused".into()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(StagemergeError::protocol("missing id").kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_transient_classification() {
        let transport = StagemergeError::Transport {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(transport.is_transient());
        assert!(StagemergeError::Network("reset".into()).is_transient());

        let remote = StagemergeError::RemoteFailure {
            job_id: "j1".into(),
            status: "Error".into(),
            details: "{}".into(),
        };
        assert!(!remote.is_transient());
        assert!(!StagemergeError::protocol("no sample").is_transient());
    }

    #[test]
    fn test_error_to_dict() {
        let err = StagemergeError::Timeout {
            job_id: "abc".into(),
            waited: Duration::from_secs(300),
        };
        let dict = err.to_dict();

        assert_eq!(dict.get("kind").unwrap(), "timeout");
        assert_eq!(dict.get("job_id").unwrap(), "abc");
        assert_eq!(dict.get("waited_seconds").unwrap(), 300.0);
    }

    #[test]
    fn test_error_kind_display_matches_serde() {
        let json = serde_json::to_string(&ErrorKind::RemoteFailure).unwrap();
        assert_eq!(json, r#""remote_failure""#);
        assert_eq!(ErrorKind::RemoteFailure.to_string(), "remote_failure");
    }

    #[test]
    fn test_canvas_too_large_to_dict() {
        let err = StagemergeError::CanvasTooLarge {
            width: 5_000_000_000,
            height: 50_000,
            max_pixels: 100,
        };
        assert_eq!(err.kind(), ErrorKind::TooLarge);
        let dict = err.to_dict();
        assert_eq!(dict.get("kind").unwrap(), "too_large");
        assert_eq!(dict.get("height").unwrap(), 50_000);
    }

    #[test]
    fn test_not_found_message_includes_path() {
        let err = StagemergeError::not_found("/tmp/missing.jpg");
        assert!(err.to_string().contains("/tmp/missing.jpg"));
    }
}
