//! A scripted, in-memory editing service.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use super::fixtures::solid_image_bytes;
use crate::client::{EditTransport, SubmitPayload};
use crate::errors::{Result, StagemergeError};

/// Poll URL handed out by [`ScriptedTransport`] submissions.
pub const SCRIPTED_POLL_URL: &str = "https://scripted.invalid/v1/get_result";

/// One scripted answer to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// Respond with this status and no result.
    Status(String),
    /// Respond `Ready` with this sample URL.
    Ready(String),
    /// Fail the query itself with this HTTP status.
    HttpError(u16),
}

/// An [`EditTransport`] that never touches the network.
///
/// Status queries consume the script front to back; once it is exhausted
/// the fallback step (default `Pending`) is returned forever. Downloads
/// return a fixed JPEG. Every call is counted.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<PollStep>>,
    fallback: Mutex<PollStep>,
    result_image: Vec<u8>,
    reject_submit: Option<u16>,
    submits: Mutex<Vec<SubmitPayload>>,
    polls: Mutex<usize>,
    fetches: Mutex<Vec<String>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(PollStep::Status("Pending".to_string())),
            result_image: solid_image_bytes(64, 48, [120, 120, 120]),
            reject_submit: None,
            submits: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A service where every job is immediately `Ready` at `url`.
    #[must_use]
    pub fn always_ready(url: impl Into<String>) -> Self {
        Self::new().repeat(PollStep::Ready(url.into()))
    }

    /// Appends a step to the script.
    #[must_use]
    pub fn then(self, step: PollStep) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Appends a non-terminal or failure status.
    #[must_use]
    pub fn then_status(self, status: impl Into<String>) -> Self {
        self.then(PollStep::Status(status.into()))
    }

    /// Appends a `Ready` response.
    #[must_use]
    pub fn then_ready(self, url: impl Into<String>) -> Self {
        self.then(PollStep::Ready(url.into()))
    }

    /// Appends a failed status query.
    #[must_use]
    pub fn then_http_error(self, status: u16) -> Self {
        self.then(PollStep::HttpError(status))
    }

    /// Sets the step returned once the script is exhausted.
    #[must_use]
    pub fn repeat(self, step: PollStep) -> Self {
        *self.fallback.lock() = step;
        self
    }

    /// Shorthand for repeating a plain status.
    #[must_use]
    pub fn repeat_status(self, status: impl Into<String>) -> Self {
        self.repeat(PollStep::Status(status.into()))
    }

    /// Serves a solid-colour JPEG of the given size from `fetch`.
    #[must_use]
    pub fn with_result_image(mut self, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        self.result_image = solid_image_bytes(width, height, rgb);
        self
    }

    /// Makes every submission fail with the given HTTP status.
    #[must_use]
    pub fn rejecting_submissions(mut self, status: u16) -> Self {
        self.reject_submit = Some(status);
        self
    }

    /// Number of submissions received.
    #[must_use]
    pub fn submit_calls(&self) -> usize {
        self.submits.lock().len()
    }

    /// Prompts of all submissions, in order.
    #[must_use]
    pub fn submitted_prompts(&self) -> Vec<String> {
        self.submits.lock().iter().map(|p| p.prompt.clone()).collect()
    }

    /// Number of status queries received.
    #[must_use]
    pub fn poll_calls(&self) -> usize {
        *self.polls.lock()
    }

    /// URLs fetched, in order.
    #[must_use]
    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetches.lock().clone()
    }

    /// Total number of calls of any kind.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.submit_calls() + self.poll_calls() + self.fetches.lock().len()
    }
}

#[async_trait]
impl EditTransport for ScriptedTransport {
    async fn submit(&self, _api_key: &str, payload: &SubmitPayload) -> Result<serde_json::Value> {
        let n = {
            let mut submits = self.submits.lock();
            submits.push(payload.clone());
            submits.len()
        };

        if let Some(status) = self.reject_submit {
            return Err(StagemergeError::Transport {
                status,
                body: "rejected by script".to_string(),
            });
        }

        Ok(serde_json::json!({
            "id": format!("scripted-{n}"),
            "polling_url": SCRIPTED_POLL_URL,
        }))
    }

    async fn query_status(
        &self,
        _api_key: &str,
        _poll_url: &str,
        job_id: &str,
    ) -> Result<serde_json::Value> {
        *self.polls.lock() += 1;

        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.lock().clone());

        match step {
            PollStep::Status(status) => Ok(serde_json::json!({"id": job_id, "status": status})),
            PollStep::Ready(url) => Ok(serde_json::json!({
                "id": job_id,
                "status": "Ready",
                "result": {"sample": url},
            })),
            PollStep::HttpError(status) => Err(StagemergeError::Transport {
                status,
                body: "scripted failure".to_string(),
            }),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.fetches.lock().push(url.to_string());
        Ok(self.result_image.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = ScriptedTransport::new()
            .then_status("Pending")
            .then_http_error(502)
            .repeat_status("Polling");

        let first = transport.query_status("k", SCRIPTED_POLL_URL, "j").await.unwrap();
        assert_eq!(first["status"], "Pending");
        assert!(transport.query_status("k", SCRIPTED_POLL_URL, "j").await.is_err());
        let third = transport.query_status("k", SCRIPTED_POLL_URL, "j").await.unwrap();
        assert_eq!(third["status"], "Polling");
        assert_eq!(transport.poll_calls(), 3);
    }

    #[tokio::test]
    async fn test_submissions_get_distinct_ids() {
        let transport = ScriptedTransport::new();
        let payload = SubmitPayload {
            prompt: "p".into(),
            input_image: String::new(),
        };

        let a = transport.submit("k", &payload).await.unwrap();
        let b = transport.submit("k", &payload).await.unwrap();
        assert_ne!(a["id"], b["id"]);
        assert_eq!(transport.submitted_prompts(), vec!["p", "p"]);
    }
}
