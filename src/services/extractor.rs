use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Output};

use crate::config::ExtractorConfig;
use crate::models::job::MediaMetadata;

/// Output template: files are named after the media title and id. The
/// bracketed id keeps any rendered name distinct from the job sidecar.
const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// The external media extraction capability.
///
/// Both calls block on network I/O and must be run off the async runtime
/// (see `services::pipeline`).
pub trait MediaExtractor: Send + Sync {
    /// Fetch descriptive metadata for `url` without downloading.
    fn extract_info(&self, url: &str) -> Result<MediaMetadata, ExtractionError>;

    /// Download the media at `url` into `dest_dir`.
    fn download(&self, url: &str, dest_dir: &Path) -> Result<(), ExtractionError>;
}

/// [`MediaExtractor`] backed by the `yt-dlp` executable.
pub struct YtDlpExtractor {
    binary: String,
    format: String,
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<String>, format: impl Into<String>, config: ExtractorConfig) -> Self {
        Self {
            binary: binary.into(),
            format: format.into(),
            config,
        }
    }

    fn info_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(self.config.to_cli_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn download_args(&self, url: &str, dest_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            self.format.clone(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "-o".to_string(),
            dest_dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned(),
        ];
        args.extend(self.config.to_cli_args());
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn run(&self, args: &[String]) -> Result<Output, ExtractionError> {
        tracing::debug!(binary = %self.binary, ?args, "Invoking yt-dlp");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|source| ExtractionError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("yt-dlp exited with {}", output.status)
            } else {
                stderr
            };
            return Err(ExtractionError::Failed(message));
        }
        Ok(output)
    }
}

impl MediaExtractor for YtDlpExtractor {
    fn extract_info(&self, url: &str) -> Result<MediaMetadata, ExtractionError> {
        let output = self.run(&self.info_args(url))?;
        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)?;
        Ok(info.into())
    }

    fn download(&self, url: &str, dest_dir: &Path) -> Result<(), ExtractionError> {
        self.run(&self.download_args(url, dest_dir))?;
        Ok(())
    }
}

/// Subset of the yt-dlp info dict we keep.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    upload_date: Option<String>,
    description: Option<String>,
    ext: Option<String>,
    format: Option<String>,
    resolution: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    channel: Option<String>,
    view_count: Option<u64>,
    like_count: Option<u64>,
}

impl From<YtDlpInfo> for MediaMetadata {
    fn from(info: YtDlpInfo) -> Self {
        Self {
            title: info.title,
            duration: info.duration,
            uploader: info.uploader,
            upload_date: info.upload_date,
            description: info.description,
            ext: info.ext,
            format: info.format,
            resolution: info.resolution,
            thumbnail: info.thumbnail,
            webpage_url: info.webpage_url,
            extractor_id: info.id,
            channel: info.channel,
            view_count: info.view_count,
            like_count: info.like_count,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// The extractor reported an error; the message is its own output.
    #[error("{0}")]
    Failed(String),

    #[error("Failed to parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),
}
