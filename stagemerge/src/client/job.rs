//! Request, job and result types for remote edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::ImageRef;

/// What a stage does with an [`EditRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// Single-image edit on the remote service.
    RemoteEdit,
    /// Deterministic local composition of two images.
    LocalComposite,
}

/// One image plus an instruction, optionally with a second image.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    source: ImageRef,
    instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secondary: Option<ImageRef>,
}

impl EditRequest {
    /// Creates a single-image request.
    pub fn new(source: impl Into<ImageRef>, instruction: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            instruction: instruction.into(),
            secondary: None,
        }
    }

    /// Attaches a second image.
    #[must_use]
    pub fn with_secondary(mut self, secondary: impl Into<ImageRef>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    /// The primary image.
    #[must_use]
    pub fn source(&self) -> &ImageRef {
        &self.source
    }

    /// The instruction text.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// The optional second image.
    #[must_use]
    pub fn secondary(&self) -> Option<&ImageRef> {
        self.secondary.as_ref()
    }

    /// The remote service takes exactly one input image, so any request
    /// carrying a second one is combined locally instead.
    #[must_use]
    pub fn action(&self) -> StageAction {
        if self.secondary.is_some() {
            StageAction::LocalComposite
        } else {
            StageAction::RemoteEdit
        }
    }
}

/// Local view of a remote job's lifecycle.
///
/// `Submitted -> Polling -> {Ready | Failed | TimedOut}`; never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted by the service, not yet polled.
    Submitted,
    /// Status queries in progress.
    Polling,
    /// Result available.
    Ready,
    /// The service reported a terminal failure.
    Failed,
    /// The deadline elapsed locally.
    TimedOut,
}

impl JobState {
    /// Returns true for states with no outgoing transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::TimedOut)
    }

    /// Whether moving from `self` to `next` is a forward transition.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Polling)
                | (Self::Polling, Self::Ready | Self::Failed | Self::TimedOut)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Polling => write!(f, "polling"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Handle to a job accepted by the editing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditJob {
    id: String,
    poll_url: String,
    state: JobState,
    poll_attempts: u32,
    submitted_at: DateTime<Utc>,
}

impl EditJob {
    /// Creates a job in the `Submitted` state.
    pub fn new(id: impl Into<String>, poll_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            poll_url: poll_url.into(),
            state: JobState::Submitted,
            poll_attempts: 0,
            submitted_at: Utc::now(),
        }
    }

    /// Service-issued job id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location to query for status.
    #[must_use]
    pub fn poll_url(&self) -> &str {
        &self.poll_url
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Number of status queries issued so far.
    #[must_use]
    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    /// When the job was accepted.
    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Moves to `next` if that is a forward transition.
    ///
    /// Returns false, leaving the state untouched, otherwise.
    pub(crate) fn advance(&mut self, next: JobState) -> bool {
        if self.state.can_advance_to(next) {
            self.state = next;
            true
        } else {
            tracing::warn!(
                job_id = %self.id,
                from = %self.state,
                to = %next,
                "Rejected backward job state transition"
            );
            false
        }
    }

    pub(crate) fn record_poll(&mut self) -> u32 {
        self.poll_attempts += 1;
        self.poll_attempts
    }
}

/// A finished job and where its image can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditResult {
    /// URL of the produced image.
    pub result_url: String,
    /// The job that produced it, in the `Ready` state.
    pub job: EditJob,
}

/// Job status as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    /// Finished; a result is available.
    Ready,
    /// Queued or running.
    Pending,
    /// Generation failed.
    Error,
    /// Generation failed.
    Failed,
    /// The output was rejected by moderation.
    ContentModerated,
    /// The input was rejected by moderation.
    RequestModerated,
    /// The service does not know the job (yet).
    TaskNotFound,
    /// Any other string; treated as still running.
    Other(String),
}

impl RemoteStatus {
    /// Parses the service's status string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "Ready" => Self::Ready,
            "Pending" => Self::Pending,
            "Error" => Self::Error,
            "Failed" => Self::Failed,
            "Content Moderated" => Self::ContentModerated,
            "Request Moderated" => Self::RequestModerated,
            "Task not found" => Self::TaskNotFound,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns true if the job succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if the job ended without a result.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Error | Self::Failed | Self::ContentModerated | Self::RequestModerated
        )
    }

    /// Returns true for either outcome.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_action() {
        let single = EditRequest::new("a.jpg", "add a dog");
        assert_eq!(single.action(), StageAction::RemoteEdit);
        assert!(single.secondary().is_none());

        let pair = single.clone().with_secondary("b.jpg");
        assert_eq!(pair.action(), StageAction::LocalComposite);
        assert_eq!(pair.instruction(), "add a dog");
    }

    #[test]
    fn test_job_state_only_moves_forward() {
        let mut job = EditJob::new("id-1", "https://poll/1");
        assert_eq!(job.state(), JobState::Submitted);

        assert!(!job.advance(JobState::Ready));
        assert!(job.advance(JobState::Polling));
        assert!(!job.advance(JobState::Submitted));
        assert!(job.advance(JobState::Ready));
        assert!(!job.advance(JobState::Polling));
        assert!(!job.advance(JobState::Failed));
        assert_eq!(job.state(), JobState::Ready);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Submitted.is_terminal());
        assert!(!JobState::Polling.is_terminal());
        assert!(JobState::Ready.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::TimedOut.is_terminal());
    }

    #[test]
    fn test_remote_status_parse() {
        assert!(RemoteStatus::parse("Ready").is_success());
        assert!(RemoteStatus::parse("Error").is_failure());
        assert!(RemoteStatus::parse("Failed").is_failure());
        assert!(RemoteStatus::parse("Content Moderated").is_failure());
        assert!(RemoteStatus::parse("Request Moderated").is_failure());
        assert!(!RemoteStatus::parse("Pending").is_terminal());
        assert!(!RemoteStatus::parse("Task not found").is_terminal());
        assert_eq!(
            RemoteStatus::parse("Polling"),
            RemoteStatus::Other("Polling".to_string())
        );
    }
}
