use chrono::Utc;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus, JobSummary, MediaMetadata};
use crate::services::sanitize::{dedupe_filename, safe_filename};

/// Name of the per-job JSON record stored next to the downloaded files.
pub const SIDECAR_FILE: &str = "metadata.json";
const SIDECAR_TMP_FILE: &str = "metadata.json.tmp";

/// Attempts at allocating a fresh job directory before giving up.
const MAX_ID_ATTEMPTS: usize = 4;

/// Flat-file job store: one directory per job under `root`, each holding the
/// downloaded output plus a `metadata.json` sidecar with the full [`Job`].
///
/// Each job's sidecar is written only by the single task processing that job,
/// so no locking is done here.
#[derive(Debug, Clone)]
pub struct JobStore {
    root: PathBuf,
}

impl JobStore {
    /// Open (and create if needed) the storage root.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, JobStoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| JobStoreError::Storage {
                path: root.clone(),
                source,
            })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, id: Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn sidecar_path(&self, id: Uuid) -> PathBuf {
        self.job_dir(id).join(SIDECAR_FILE)
    }

    /// Allocate a new job directory and persist its initial `pending` record.
    pub async fn create(&self, source_url: &str) -> Result<Job, JobStoreError> {
        let mut attempts = 0;
        let id = loop {
            let id = Uuid::new_v4();
            let dir = self.job_dir(id);
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => break id,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_ID_ATTEMPTS => {
                    attempts += 1;
                    tracing::warn!(job_id = %id, "Job directory already exists, allocating another id");
                }
                Err(source) => return Err(JobStoreError::Storage { path: dir, source }),
            }
        };

        let job = Job::new(id, source_url);
        self.write(&job).await?;

        tracing::info!(job_id = %id, url = %source_url, "Created download job");
        Ok(job)
    }

    /// Move a pending job to `downloading`.
    pub async fn begin_processing(&self, id: Uuid) -> Result<Job, JobStoreError> {
        self.update(id, |job| {
            if job.status != JobStatus::Pending {
                return Err(JobStoreError::InvalidTransition {
                    id,
                    from: job.status,
                    to: JobStatus::Downloading,
                });
            }
            job.status = JobStatus::Downloading;
            Ok(())
        })
        .await
    }

    /// Merge extracted attributes into the job without touching its status.
    pub async fn attach_metadata(
        &self,
        id: Uuid,
        metadata: MediaMetadata,
    ) -> Result<Job, JobStoreError> {
        self.update(id, |job| {
            job.metadata.get_or_insert_with(MediaMetadata::default).merge(metadata);
            Ok(())
        })
        .await
    }

    /// Rename each raw output file to its storage-safe name and mark the job
    /// `completed` with the resulting names, in input order.
    ///
    /// Raw names are taken as OS strings since the extractor may produce
    /// names that are not valid UTF-8; those are sanitized lossily.
    pub async fn complete_with_files<S: AsRef<OsStr>>(
        &self,
        id: Uuid,
        raw_filenames: &[S],
    ) -> Result<Job, JobStoreError> {
        let mut job = self.read(id).await?;
        ensure_open(&job, JobStatus::Completed)?;

        let raw_filenames: Vec<&OsStr> = raw_filenames
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| !is_reserved(name))
            .collect();
        if raw_filenames.is_empty() {
            return Err(JobStoreError::NoFiles);
        }

        let dir = self.job_dir(id);
        let mut taken = self.dir_entries(&dir).await?;
        let mut files = Vec::with_capacity(raw_filenames.len());

        for raw in raw_filenames {
            if !taken.contains(raw) {
                return Err(JobStoreError::Storage {
                    path: dir.join(raw),
                    source: std::io::Error::new(ErrorKind::NotFound, "downloaded file is missing"),
                });
            }

            let safe = safe_filename(&raw.to_string_lossy());
            if raw.to_str() == Some(safe.as_str()) {
                files.push(safe);
                continue;
            }

            let target = dedupe_filename(&safe, |candidate| taken.contains(OsStr::new(candidate)));
            let from = dir.join(raw);
            let to = dir.join(&target);
            tokio::fs::rename(&from, &to)
                .await
                .map_err(|source| JobStoreError::Storage { path: from, source })?;

            tracing::debug!(job_id = %id, from = ?raw, to = %target, "Renamed output file");
            taken.remove(raw);
            taken.insert(OsString::from(&target));
            files.push(target);
        }

        job.status = JobStatus::Completed;
        job.files = files;
        job.error = None;
        job.updated_at = Utc::now();
        self.write(&job).await?;

        tracing::info!(job_id = %id, files = ?job.files, "Download job completed");
        Ok(job)
    }

    /// Mark the job `failed`. Never returns an error: if the sidecar cannot
    /// be updated the failure is logged and `None` is returned.
    pub async fn fail(&self, id: Uuid, error_message: &str) -> Option<Job> {
        let message = error_message.to_string();
        let result = self
            .update(id, move |job| {
                ensure_open(job, JobStatus::Failed)?;
                job.status = JobStatus::Failed;
                job.error = Some(message);
                job.files.clear();
                Ok(())
            })
            .await;

        match result {
            Ok(job) => {
                tracing::warn!(job_id = %id, error = %error_message, "Download job failed");
                Some(job)
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
                None
            }
        }
    }

    /// Look up a job by its string id as received from a client.
    pub async fn get_status(&self, id: &str) -> Result<Job, JobStoreError> {
        let id = Uuid::parse_str(id).map_err(|_| JobStoreError::NotFound(id.to_string()))?;
        self.read(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, JobStoreError> {
        self.read(id).await
    }

    /// Summaries of every job with a readable sidecar, newest first.
    /// Directories without one are skipped.
    pub async fn list(&self) -> Result<Vec<JobSummary>, JobStoreError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|source| self.storage_err(source))?;

        let mut jobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| self.storage_err(source))?
        {
            let sidecar = entry.path().join(SIDECAR_FILE);
            match read_sidecar(&sidecar).await {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping entry without readable sidecar");
                }
            }
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs.iter().map(JobSummary::from).collect())
    }

    /// Regular files in the job directory, sorted by name, sidecar excluded.
    pub async fn output_files(&self, id: Uuid) -> Result<Vec<OsString>, JobStoreError> {
        let dir = self.job_dir(id);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|source| JobStoreError::Storage {
                path: dir.clone(),
                source,
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| JobStoreError::Storage {
                path: dir.clone(),
                source,
            })?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name();
            if is_file && !is_reserved(&name) {
                files.push(name);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Best-effort removal of partial output left behind by a failed
    /// download. Completed jobs are never touched.
    pub async fn discard_outputs(&self, id: Uuid) {
        match self.read(id).await {
            Ok(job) if job.status == JobStatus::Completed => return,
            Ok(_) => {}
            Err(_) => return,
        }

        let Ok(files) = self.output_files(id).await else {
            return;
        };
        let dir = self.job_dir(id);
        for name in files {
            if let Err(e) = tokio::fs::remove_file(dir.join(&name)).await {
                tracing::warn!(job_id = %id, file = ?name, error = %e, "Failed to remove partial output");
            }
        }
    }

    /// Check that the storage root is still reachable.
    pub async fn health_check(&self) -> Result<(), JobStoreError> {
        tokio::fs::metadata(&self.root)
            .await
            .map(|_| ())
            .map_err(|source| self.storage_err(source))
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> Result<Job, JobStoreError>
    where
        F: FnOnce(&mut Job) -> Result<(), JobStoreError>,
    {
        let mut job = self.read(id).await?;
        apply(&mut job)?;
        job.updated_at = Utc::now();
        self.write(&job).await?;
        Ok(job)
    }

    async fn read(&self, id: Uuid) -> Result<Job, JobStoreError> {
        match read_sidecar(&self.sidecar_path(id)).await {
            Err(JobStoreError::Storage { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Err(JobStoreError::NotFound(id.to_string()))
            }
            other => other,
        }
    }

    /// Write the sidecar through a temp file so readers never observe a
    /// partially written record.
    async fn write(&self, job: &Job) -> Result<(), JobStoreError> {
        let dir = self.job_dir(job.id);
        let tmp = dir.join(SIDECAR_TMP_FILE);
        let path = dir.join(SIDECAR_FILE);

        let payload = serde_json::to_vec_pretty(job).map_err(|source| JobStoreError::Corrupt {
            path: path.clone(),
            source,
        })?;

        tokio::fs::write(&tmp, payload)
            .await
            .map_err(|source| JobStoreError::Storage {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| JobStoreError::Storage { path, source })?;
        Ok(())
    }

    async fn dir_entries(&self, dir: &Path) -> Result<HashSet<OsString>, JobStoreError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|source| JobStoreError::Storage {
                path: dir.to_path_buf(),
                source,
            })?;

        let mut names = HashSet::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| JobStoreError::Storage {
                path: dir.to_path_buf(),
                source,
            })?
        {
            names.insert(entry.file_name());
        }
        Ok(names)
    }

    fn storage_err(&self, source: std::io::Error) -> JobStoreError {
        JobStoreError::Storage {
            path: self.root.clone(),
            source,
        }
    }
}

async fn read_sidecar(path: &Path) -> Result<Job, JobStoreError> {
    let raw = tokio::fs::read(path)
        .await
        .map_err(|source| JobStoreError::Storage {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|source| JobStoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_open(job: &Job, to: JobStatus) -> Result<(), JobStoreError> {
    if job.status.is_terminal() {
        return Err(JobStoreError::InvalidTransition {
            id: job.id,
            from: job.status,
            to,
        });
    }
    Ok(())
}

fn is_reserved(name: &OsStr) -> bool {
    name == SIDECAR_FILE || name == SIDECAR_TMP_FILE
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("No files were downloaded")]
    NoFiles,

    #[error("Storage error at '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt job record at '{path}': {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
