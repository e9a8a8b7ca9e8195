//! Wire access to the editing service.
//!
//! [`EditTransport`] is the seam between the polling logic in
//! [`EditClient`](super::EditClient) and HTTP. [`HttpTransport`] is the
//! production implementation over [`reqwest`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EditServiceConfig;
use crate::errors::{Result, StagemergeError};

/// Body of a submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPayload {
    /// Edit instruction.
    pub prompt: String,
    /// Base64 JPEG of the input image.
    pub input_image: String,
}

/// Submission response. Both fields are required by contract but checked
/// by the client, so they are optional here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    /// Service-issued job id.
    #[serde(default)]
    pub id: Option<String>,
    /// Where to query status.
    #[serde(default)]
    pub polling_url: Option<String>,
}

/// Status query response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    /// Raw status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Present once the job is `Ready`.
    #[serde(default)]
    pub result: Option<StatusResult>,
}

/// Result section of a `Ready` status response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResult {
    /// URL of the produced image.
    #[serde(default)]
    pub sample: Option<String>,
}

/// Raw calls against the editing service.
///
/// Implementations report non-success HTTP statuses as
/// [`StagemergeError::Transport`] and connection problems as
/// [`StagemergeError::Network`]; they do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditTransport: Send + Sync {
    /// Submits an edit; returns the raw JSON response.
    async fn submit(&self, api_key: &str, payload: &SubmitPayload) -> Result<serde_json::Value>;

    /// Queries a job's status; returns the raw JSON response.
    async fn query_status(
        &self,
        api_key: &str,
        poll_url: &str,
        job_id: &str,
    ) -> Result<serde_json::Value>;

    /// Downloads the bytes at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP implementation of [`EditTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport with a client honoring the configured timeout.
    ///
    /// Fails with a config error if the timeout is unusable.
    pub fn new(config: &EditServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout()?)
            .build()
            .map_err(|e| StagemergeError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The submission endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the response unchanged on success, or a transport error
    /// carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StagemergeError::Transport {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_json(response: reqwest::Response) -> Result<serde_json::Value> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[async_trait]
impl EditTransport for HttpTransport {
    async fn submit(&self, api_key: &str, payload: &SubmitPayload) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("accept", "application/json")
            .header("x-key", api_key)
            .json(payload)
            .send()
            .await?;

        Self::parse_json(response).await
    }

    async fn query_status(
        &self,
        api_key: &str,
        poll_url: &str,
        job_id: &str,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(poll_url)
            .header("accept", "application/json")
            .header("x-key", api_key)
            .query(&[("id", job_id)])
            .send()
            .await?;

        Self::parse_json(response).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
