use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus, JobSummary, MediaMetadata};

/// Form submitted to `POST /download`.
#[derive(Debug, Deserialize, Validate)]
pub struct DownloadRequest {
    #[garde(length(min = 1, max = 2048), url, custom(http_scheme))]
    pub url: String,

    /// Block until the job reaches a terminal state instead of returning
    /// the id immediately.
    #[serde(default)]
    #[garde(skip)]
    pub wait: Option<bool>,
}

fn http_scheme(value: &str, _context: &()) -> garde::Result {
    let lower = value.trim_start().to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(())
    } else {
        Err(garde::Error::new("url must use http or https"))
    }
}

/// Response after queueing a download.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub download_id: Uuid,
    pub status: JobStatus,
}

/// Final outcome of a download, returned by the blocking submission mode.
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadResult {
    pub url: String,
    pub download_id: Uuid,
    pub files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for DownloadResult {
    fn from(job: Job) -> Self {
        Self {
            url: job.source_url,
            download_id: job.id,
            files: job.files,
            metadata: job.metadata,
            error: job.error,
        }
    }
}

/// Response for `GET /files`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub downloads: Vec<JobSummary>,
}
