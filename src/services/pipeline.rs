use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::models::job::{Job, MediaMetadata};
use crate::services::extractor::{ExtractionError, MediaExtractor};
use crate::services::job_store::{JobStore, JobStoreError};

/// Runs a single job end to end: extract info, download, rename, record outcome.
#[derive(Clone)]
pub struct Pipeline {
    store: JobStore,
    extractor: Arc<dyn MediaExtractor>,
}

impl Pipeline {
    pub fn new(store: JobStore, extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { store, extractor }
    }

    /// Process the job and return its terminal record. Every error is
    /// converted into a `failed` status; `None` only when even that could not
    /// be persisted.
    pub async fn run(&self, job_id: Uuid, url: &str) -> Option<Job> {
        let start = Instant::now();
        tracing::info!(job_id = %job_id, url = %url, "Processing download job");

        match self.process(job_id, url).await {
            Ok(job) => {
                let elapsed = start.elapsed();
                metrics::counter!("download_jobs_completed").increment(1);
                metrics::histogram!("download_processing_seconds").record(elapsed.as_secs_f64());
                tracing::info!(
                    job_id = %job_id,
                    duration_ms = elapsed.as_millis() as u64,
                    files = job.files.len(),
                    "Job completed successfully"
                );
                Some(job)
            }
            Err(e) => {
                metrics::counter!("download_jobs_failed").increment(1);
                tracing::error!(job_id = %job_id, error = %e, "Job processing failed");
                self.store.discard_outputs(job_id).await;
                self.store.fail(job_id, &e.to_string()).await
            }
        }
    }

    async fn process(&self, job_id: Uuid, url: &str) -> Result<Job, PipelineError> {
        self.store.begin_processing(job_id).await?;

        tracing::debug!(job_id = %job_id, "Extracting media info");
        let metadata = self.extract_info(url).await?;
        tracing::info!(
            job_id = %job_id,
            title = metadata.title.as_deref().unwrap_or("<untitled>"),
            "Extracted media info"
        );
        self.store.attach_metadata(job_id, metadata).await?;

        tracing::debug!(job_id = %job_id, "Downloading media");
        self.download(url, job_id).await?;

        let files = self.store.output_files(job_id).await?;
        Ok(self.store.complete_with_files(job_id, &files).await?)
    }

    async fn extract_info(&self, url: &str) -> Result<MediaMetadata, PipelineError> {
        let extractor = Arc::clone(&self.extractor);
        let url = url.to_string();
        let result = tokio::task::spawn_blocking(move || extractor.extract_info(&url))
            .await
            .map_err(|e| PipelineError::Panicked(e.to_string()))?;
        Ok(result?)
    }

    async fn download(&self, url: &str, job_id: Uuid) -> Result<(), PipelineError> {
        let extractor = Arc::clone(&self.extractor);
        let url = url.to_string();
        let dest = self.store.job_dir(job_id);
        let result = tokio::task::spawn_blocking(move || extractor.download(&url, &dest))
            .await
            .map_err(|e| PipelineError::Panicked(e.to_string()))?;
        Ok(result?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] JobStoreError),

    #[error("Extractor task aborted: {0}")]
    Panicked(String),
}
