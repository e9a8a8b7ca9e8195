//! Client for the asynchronous image-editing service.
//!
//! An edit is three steps: [`EditClient::submit`] hands the encoded image
//! and instruction to the service, [`EditClient::await_completion`] polls
//! until the job is terminal or the deadline passes, and
//! [`EditClient::download_result`] stores the produced image locally.
//!
//! The polling loop separates two kinds of failure. A status query that
//! itself fails (bad HTTP status, dropped connection) is logged and retried
//! after a short backoff. A job that *reports* failure ends the loop at once.

mod job;
mod transport;

pub use job::{EditJob, EditRequest, EditResult, JobState, RemoteStatus, StageAction};
pub use transport::{
    EditTransport, HttpTransport, StatusResponse, StatusResult, SubmitPayload, SubmitResponse,
};

#[cfg(test)]
pub use transport::MockEditTransport;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::codec::{self, ImageRef};
use crate::config::EditServiceConfig;
use crate::errors::{Result, StagemergeError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};

/// Submits edits and waits for their results.
#[derive(Clone)]
pub struct EditClient {
    config: EditServiceConfig,
    transport: Arc<dyn EditTransport>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for EditClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EditClient {
    /// Creates a client talking HTTP to the configured endpoint.
    pub fn new(config: EditServiceConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client over an arbitrary transport.
    pub fn with_transport(config: EditServiceConfig, transport: Arc<dyn EditTransport>) -> Self {
        Self {
            config,
            transport,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink receiving job events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The client's configuration.
    #[must_use]
    pub fn config(&self) -> &EditServiceConfig {
        &self.config
    }

    /// The deadline used when none is given explicitly.
    #[must_use]
    pub fn default_deadline(&self) -> Duration {
        self.config.poll.max_wait()
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(StagemergeError::Auth)
    }

    /// Submits `request` and returns a handle to the queued job.
    ///
    /// Only the primary image is sent. Exactly one call is made; a failed
    /// submission is not retried.
    pub async fn submit(&self, request: &EditRequest) -> Result<EditJob> {
        let api_key = self.api_key()?;

        let source = request.source().clone();
        let input_image = tokio::task::spawn_blocking(move || codec::encode(&source))
            .await
            .map_err(|e| StagemergeError::Encode(e.to_string()))??;

        let payload = SubmitPayload {
            prompt: request.instruction().to_string(),
            input_image,
        };

        let body = self.transport.submit(api_key, &payload).await?;
        let response: SubmitResponse = serde_json::from_value(body)
            .map_err(|e| StagemergeError::protocol(format!("malformed submit response: {e}")))?;

        let id = response
            .id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StagemergeError::protocol("submit response has no 'id'"))?;
        let polling_url = response
            .polling_url
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StagemergeError::protocol("submit response has no 'polling_url'"))?;

        tracing::info!(job_id = %id, source = %request.source(), "Edit request submitted");
        self.events
            .emit(&PipelineEvent::JobSubmitted { job_id: id.clone() });

        Ok(EditJob::new(id, polling_url))
    }

    /// Polls `job` until it is terminal or `deadline` has elapsed.
    ///
    /// Returns as soon as a `Ready` response arrives; no query is issued
    /// after it. A failure status yields [`StagemergeError::RemoteFailure`]
    /// immediately. Status queries that fail at the transport level are
    /// retried after the configured backoff until the deadline. Timing out
    /// only stops local polling; the remote job is not cancelled.
    pub async fn await_completion(&self, mut job: EditJob, deadline: Duration) -> Result<EditResult> {
        let api_key = self.api_key()?;
        let started = Instant::now();
        job.advance(JobState::Polling);

        loop {
            let Some(remaining) = deadline.checked_sub(started.elapsed()).filter(|r| !r.is_zero())
            else {
                return Err(self.time_out(job, deadline));
            };

            let attempt = job.record_poll();
            let query = self.transport.query_status(api_key, job.poll_url(), job.id());
            let outcome = match tokio::time::timeout(remaining, query).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(self.time_out(job, deadline)),
            };

            let delay = match outcome {
                Ok(body) => {
                    let response: StatusResponse = serde_json::from_value(body.clone()).map_err(|e| {
                        StagemergeError::protocol(format!("malformed status response: {e}"))
                    })?;
                    let raw_status = response.status.clone().unwrap_or_default();
                    let status = RemoteStatus::parse(&raw_status);

                    self.events.emit(&PipelineEvent::JobPolled {
                        job_id: job.id().to_string(),
                        status: raw_status.clone(),
                        attempt,
                    });

                    if status.is_terminal() {
                        if status.is_success() {
                            return self.complete(job, response);
                        }
                        job.advance(JobState::Failed);
                        self.finish(&job);
                        return Err(StagemergeError::RemoteFailure {
                            job_id: job.id().to_string(),
                            status: raw_status,
                            details: body.to_string(),
                        });
                    }

                    tracing::debug!(
                        job_id = %job.id(),
                        status = %raw_status,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job still running"
                    );
                    self.config.poll.interval()
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        job_id = %job.id(),
                        attempt,
                        error = %e,
                        "Status query failed; retrying"
                    );
                    self.config.poll.error_backoff()
                }
                Err(e) => {
                    job.advance(JobState::Failed);
                    self.finish(&job);
                    return Err(e);
                }
            };

            let remaining = deadline.saturating_sub(started.elapsed());
            tokio::time::sleep(delay.min(remaining)).await;
        }
    }

    /// Downloads the image of a finished job to `dest`.
    pub async fn download_result(&self, result: &EditResult, dest: &Path) -> Result<ImageRef> {
        tracing::debug!(job_id = %result.job.id(), url = %result.result_url, "Downloading result");

        let bytes = self.transport.fetch(&result.result_url).await?;
        let saved = codec::write_bytes(dest, &bytes)?;

        tracing::info!(
            job_id = %result.job.id(),
            path = %saved,
            bytes = bytes.len(),
            "Result image saved"
        );
        Ok(saved)
    }

    /// Runs a full remote edit: submit, wait with the default deadline,
    /// download to `dest`.
    pub async fn edit(&self, request: &EditRequest, dest: &Path) -> Result<ImageRef> {
        let job = self.submit(request).await?;
        let result = self.await_completion(job, self.default_deadline()).await?;
        self.download_result(&result, dest).await
    }

    fn complete(&self, mut job: EditJob, response: StatusResponse) -> Result<EditResult> {
        let Some(result_url) = response.result.and_then(|r| r.sample).filter(|s| !s.is_empty())
        else {
            job.advance(JobState::Failed);
            self.finish(&job);
            return Err(StagemergeError::protocol(format!(
                "job {} is Ready but has no result sample",
                job.id()
            )));
        };

        job.advance(JobState::Ready);
        self.finish(&job);
        tracing::info!(
            job_id = %job.id(),
            attempts = job.poll_attempts(),
            url = %result_url,
            "Job ready"
        );

        Ok(EditResult { result_url, job })
    }

    fn time_out(&self, mut job: EditJob, deadline: Duration) -> StagemergeError {
        job.advance(JobState::TimedOut);
        self.finish(&job);
        tracing::warn!(
            job_id = %job.id(),
            attempts = job.poll_attempts(),
            deadline_s = deadline.as_secs_f64(),
            "Gave up waiting for job"
        );
        StagemergeError::Timeout {
            job_id: job.id().to_string(),
            waited: deadline,
        }
    }

    fn finish(&self, job: &EditJob) {
        self.events.emit(&PipelineEvent::JobFinished {
            job_id: job.id().to_string(),
            state: job.state(),
        });
    }
}
