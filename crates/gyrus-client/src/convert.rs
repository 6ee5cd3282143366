//! Client for the scan conversion service.
//!
//! A conversion is submitted per patient, then polled until the backend
//! reports a terminal status. Polling can be cancelled from another task
//! through a shared [`CancelFlag`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Delay between consecutive job status requests.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Errors from talking to the conversion service.
#[derive(Error, Debug)]
pub enum RemoteRequestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
}

/// Lifecycle states reported by the conversion backend.
///
/// Statuses this client does not know about deserialize to [`JobStatus::Unknown`]
/// and are treated as still in progress, so a newer backend cannot wedge the
/// poll loop with an unrecognized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Unknown => "unknown",
        })
    }
}

/// One status snapshot for a conversion job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub result_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The backend finished the conversion. `result_path` points at the
    /// produced model when the backend supplied one.
    Done { result_path: Option<String> },
    /// The backend gave up on the job.
    Failed,
    /// The caller cancelled polling before the job reached a terminal status.
    Cancelled,
}

/// Shared cancellation handle for an in-flight poll loop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// HTTP client for submitting and polling conversion jobs.
pub struct ConversionClient {
    client: reqwest::Client,
    base_url: String,
}

impl ConversionClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteRequestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests a conversion for the given patient and returns the job id.
    pub async fn submit(&self, patient_id: &str) -> Result<String, RemoteRequestError> {
        let url = format!("{}/convert", self.base_url);
        info!(patient_id = %patient_id, url = %url, "Submitting conversion job");

        let response = self
            .client
            .post(&url)
            .query(&[("patient_id", patient_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteRequestError::Status {
                status: response.status(),
                url,
            });
        }

        let submitted: SubmitResponse = response.json().await?;
        info!(job_id = %submitted.job_id, "Conversion job accepted");
        Ok(submitted.job_id)
    }

    /// Fetches the current status of a job.
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse, RemoteRequestError> {
        let url = format!("{}/job/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(RemoteRequestError::Status {
                status: response.status(),
                url,
            });
        }

        Ok(response.json().await?)
    }

    /// Polls a job every [`POLL_INTERVAL`] until it reaches a terminal status
    /// or `cancel` is raised.
    ///
    /// `on_update` is invoked once per non-terminal snapshot. The terminal
    /// status is reported exactly once, through the returned [`PollOutcome`].
    /// Cancellation is honored before every request and again after each
    /// interval sleep, so a cancelled loop issues no further requests.
    pub async fn poll_until_terminal(
        &self,
        job_id: &str,
        cancel: &CancelFlag,
        mut on_update: impl FnMut(&JobStatusResponse),
    ) -> Result<PollOutcome, RemoteRequestError> {
        loop {
            if cancel.is_cancelled() {
                info!(job_id = %job_id, "Polling cancelled");
                return Ok(PollOutcome::Cancelled);
            }

            let snapshot = self.job_status(job_id).await?;
            debug!(job_id = %job_id, status = ?snapshot.status, "Job status");

            match snapshot.status {
                JobStatus::Done => {
                    info!(job_id = %job_id, result_path = ?snapshot.result_path, "Conversion finished");
                    return Ok(PollOutcome::Done {
                        result_path: snapshot.result_path,
                    });
                }
                JobStatus::Failed => {
                    warn!(job_id = %job_id, "Conversion failed");
                    return Ok(PollOutcome::Failed);
                }
                _ => on_update(&snapshot),
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}
