//! Test fixtures: a scripted stand-in for yt-dlp.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use video_download_service::models::job::MediaMetadata;
use video_download_service::services::extractor::{ExtractionError, MediaExtractor};

pub const VIDEO_URL: &str = "https://example.com/video";
pub const VIDEO_TITLE: &str = "My Video!! (2024)";
pub const RAW_FILENAME: &str = "My Video!! (2024).mp4";
pub const SAFE_FILENAME: &str = "My_Video_2024.mp4";
pub const FILE_CONTENT: &[u8] = b"not really an mp4";

/// Blocks extractor calls until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }
}

/// Scripted extractor: reports `title` on info extraction and writes `files` on
/// download, unless told to fail or panic.
pub struct MockExtractor {
    pub title: String,
    pub files: Vec<String>,
    pub info_error: Option<String>,
    pub download_error: Option<String>,
    pub panic_on_download: bool,
    pub gate: Option<Arc<Gate>>,
    pub downloads: AtomicUsize,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self {
            title: VIDEO_TITLE.to_string(),
            files: vec![RAW_FILENAME.to_string()],
            info_error: None,
            download_error: None,
            panic_on_download: false,
            gate: None,
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn with_files(mut self, files: &[&str]) -> Self {
        self.files = files.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn failing_info(mut self, message: &str) -> Self {
        self.info_error = Some(message.to_string());
        self
    }

    pub fn failing_download(mut self, message: &str) -> Self {
        self.download_error = Some(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_download = true;
        self
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl MediaExtractor for MockExtractor {
    fn extract_info(&self, url: &str) -> Result<MediaMetadata, ExtractionError> {
        if let Some(message) = &self.info_error {
            return Err(ExtractionError::Failed(message.clone()));
        }
        Ok(MediaMetadata {
            title: Some(self.title.clone()),
            webpage_url: Some(url.to_string()),
            ext: Some("mp4".to_string()),
            duration: Some(12.5),
            ..Default::default()
        })
    }

    fn download(&self, _url: &str, dest_dir: &Path) -> Result<(), ExtractionError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait();
        }
        if self.panic_on_download {
            panic!("extractor crashed");
        }
        if let Some(message) = &self.download_error {
            // leave a partial file behind, like an interrupted download
            std::fs::write(dest_dir.join("partial.mp4.part"), b"half").ok();
            return Err(ExtractionError::Failed(message.clone()));
        }
        for name in &self.files {
            std::fs::write(dest_dir.join(name), FILE_CONTENT)
                .map_err(|e| ExtractionError::Failed(e.to_string()))?;
        }
        Ok(())
    }
}
