use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a download job. Transitions only move forward:
/// `pending -> downloading -> {completed, failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Attributes reported by the extraction library when it inspects a URL.
///
/// Every field is optional because sites expose wildly different subsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    /// Identifier of the media on its source site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
}

impl MediaMetadata {
    /// Merge `other` into `self`. Attributes `other` leaves unset keep
    /// their current value.
    pub fn merge(&mut self, other: MediaMetadata) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.title, other.title);
        take(&mut self.duration, other.duration);
        take(&mut self.uploader, other.uploader);
        take(&mut self.upload_date, other.upload_date);
        take(&mut self.description, other.description);
        take(&mut self.ext, other.ext);
        take(&mut self.format, other.format);
        take(&mut self.resolution, other.resolution);
        take(&mut self.thumbnail, other.thumbnail);
        take(&mut self.webpage_url, other.webpage_url);
        take(&mut self.extractor_id, other.extractor_id);
        take(&mut self.channel, other.channel);
        take(&mut self.view_count, other.view_count);
        take(&mut self.like_count, other.like_count);
    }
}

/// A download job, persisted verbatim as the `metadata.json` sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub source_url: String,
    pub status: JobStatus,
    pub files: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<MediaMetadata>,
}

impl Job {
    pub fn new(id: Uuid, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_url: source_url.into(),
            status: JobStatus::Pending,
            files: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            metadata: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.title.as_deref())
    }
}

/// Listing entry for `GET /files`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub source_url: String,
    pub status: JobStatus,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            title: job.title().map(str::to_string),
            source_url: job.source_url.clone(),
            status: job.status,
        }
    }
}
