//! HTTP client for the copilot API: submit a job, then poll until it settles.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::error::ClientError;
use crate::jobs::model::{JobContent, JobKind, JobReceipt, JobState};
use crate::jobs::request::{JobRequest, SubmissionBody};
use crate::jobs::schemas::SchemaIssue;

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// A job as seen by a poller.
///
/// `content` stays untyped on the wire; [`PolledJob::typed_content`]
/// checks it against the job kind's schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledJob {
    pub id: Uuid,
    pub state: JobState,
    pub content: Option<serde_json::Value>,
    pub error: Option<String>,
    pub kind: JobKind,
    pub updated_at: DateTime<Utc>,
}

impl PolledJob {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Decode `content` for this job's kind, if there is any.
    pub fn typed_content(&self) -> Option<Result<JobContent, Vec<SchemaIssue>>> {
        self.content
            .as_ref()
            .map(|value| JobContent::decode(self.kind, value))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Client for a running copilot service.
#[derive(Debug, Clone)]
pub struct CopilotClient {
    http: reqwest::Client,
    base_url: String,
}

impl CopilotClient {
    /// `base_url` is the service root, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/copilot/v1{path}", self.base_url)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<(u16, Envelope<T>), ClientError> {
        let status = response.status().as_u16();
        let envelope = response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok((status, envelope))
    }

    /// Submit a job. Resolves once the service has queued it.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobReceipt, ClientError> {
        let response = self
            .http
            .post(self.url("/jobs"))
            .json(&SubmissionBody::from(request))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let (status, envelope) = Self::read_envelope::<JobReceipt>(response).await?;
        match envelope {
            Envelope {
                ok: true,
                data: Some(receipt),
                ..
            } => Ok(receipt),
            Envelope { error, .. } => Err(ClientError::Api {
                status,
                message: error.unwrap_or_else(|| "Submission failed".to_string()),
            }),
        }
    }

    /// Current status of a job; `None` when the service does not know it.
    pub async fn status(&self, job_id: Uuid) -> Result<Option<PolledJob>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/status/{job_id}")))
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let (status, envelope) = Self::read_envelope::<PolledJob>(response).await?;
        match envelope {
            Envelope {
                ok: true,
                data: Some(job),
                ..
            } => Ok(Some(job)),
            Envelope { error, .. } => Err(ClientError::Api {
                status,
                message: error.unwrap_or_else(|| "Status request failed".to_string()),
            }),
        }
    }

    /// Poll every `interval` until the job is terminal or `timeout` passes.
    ///
    /// Giving up does not cancel the job; it keeps running on the service.
    pub async fn wait_for_terminal(
        &self,
        job_id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<PolledJob, ClientError> {
        let started = tokio::time::Instant::now();
        loop {
            let job = self.status(job_id).await?.ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Job not found".to_string(),
            })?;
            if job.is_terminal() {
                return Ok(job);
            }
            debug!(job_id = %job_id, state = %job.state, "Job not settled yet");

            let waited = started.elapsed();
            if waited + interval > timeout {
                return Err(ClientError::Timeout { job_id, waited });
            }
            tokio::time::sleep(interval).await;
        }
    }
}
