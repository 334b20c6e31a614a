use serde::Deserialize;
use std::path::PathBuf;

pub mod extractor;

pub use extractor::{ConfigError, ExtractorConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Root directory holding one subdirectory per download job
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,

    /// Optional JSON file with extractor arguments and yt-dlp options
    #[serde(default = "default_extractor_config")]
    pub extractor_config: PathBuf,

    /// yt-dlp executable name or path
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,

    /// Format selector passed to yt-dlp when downloading
    #[serde(default = "default_ytdlp_format")]
    pub ytdlp_format: String,

    /// Number of jobs processed concurrently
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Jobs allowed to wait for a worker before submissions are rejected
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_extractor_config() -> PathBuf {
    PathBuf::from("extractor_config.json")
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

fn default_ytdlp_format() -> String {
    "best".to_string()
}

fn default_worker_count() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    32
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
