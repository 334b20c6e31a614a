//! Job processing tests: pipeline outcomes and worker pool behavior.

mod fixtures;
mod helpers;

use futures::future::join_all;
use std::ffi::OsString;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use fixtures::*;
use helpers::*;
use video_download_service::models::job::JobStatus;
use video_download_service::services::job_store::JobStore;
use video_download_service::services::pipeline::Pipeline;
use video_download_service::services::queue::{JobQueue, QueueError, QueuedJob};

async fn pipeline(extractor: MockExtractor) -> (TempDir, JobStore, Arc<MockExtractor>, Pipeline) {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::open(dir.path()).await.unwrap();
    let extractor = Arc::new(extractor);
    let pipeline = Pipeline::new(store.clone(), extractor.clone());
    (dir, store, extractor, pipeline)
}

#[tokio::test]
async fn test_successful_job_is_completed_with_safe_names() {
    let (_dir, store, _extractor, pipeline) = pipeline(MockExtractor::new()).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let done = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.files, vec![SAFE_FILENAME.to_string()]);
    assert!(done.error.is_none());

    let metadata = done.metadata.unwrap();
    assert_eq!(metadata.title.as_deref(), Some(VIDEO_TITLE));
    assert_eq!(metadata.webpage_url.as_deref(), Some(VIDEO_URL));

    let on_disk = store.output_files(job.id).await.unwrap();
    assert_eq!(on_disk, vec![OsString::from(SAFE_FILENAME)]);
}

#[tokio::test]
async fn test_download_error_fails_job() {
    let extractor = MockExtractor::new().failing_download("ERROR: HTTP Error 403: Forbidden");
    let (_dir, store, _extractor, pipeline) = pipeline(extractor).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let failed = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("ERROR: HTTP Error 403: Forbidden"));
    assert!(failed.files.is_empty());
    // metadata from the successful info extraction is kept
    assert_eq!(failed.title(), Some(VIDEO_TITLE));
    // partial output is cleaned up
    assert!(store.output_files(job.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_info_error_skips_download() {
    let extractor = MockExtractor::new().failing_info("ERROR: Unsupported URL: https://example.com/video");
    let (_dir, store, extractor, pipeline) = pipeline(extractor).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let failed = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("Unsupported URL"));
    assert!(failed.metadata.is_none());
    assert_eq!(extractor.download_count(), 0);
}

#[tokio::test]
async fn test_panicking_extractor_fails_job() {
    let (_dir, store, _extractor, pipeline) = pipeline(MockExtractor::new().panicking()).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let failed = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("aborted"));
}

#[tokio::test]
async fn test_no_output_fails_job() {
    let (_dir, store, _extractor, pipeline) = pipeline(MockExtractor::new().with_files(&[])).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let failed = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("No files were downloaded"));
}

#[tokio::test]
async fn test_colliding_outputs_get_distinct_names() {
    let extractor = MockExtractor::new().with_files(&["Live: Part 1.mp4", "Live? Part 1.mp4"]);
    let (_dir, store, _extractor, pipeline) = pipeline(extractor).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let done = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.files,
        vec!["Live_Part_1.mp4".to_string(), "Live_Part_1_1.mp4".to_string()]
    );
    for name in &done.files {
        assert!(store.job_dir(job.id).join(name).exists());
    }
}

#[tokio::test]
async fn test_terminal_state_is_reached_once() {
    let (_dir, store, extractor, pipeline) = pipeline(MockExtractor::new()).await;
    let job = store.create(VIDEO_URL).await.unwrap();

    let first = pipeline.run(job.id, VIDEO_URL).await.unwrap();
    assert_eq!(first.status, JobStatus::Completed);

    // a second run cannot reopen or fail the job
    assert!(pipeline.run(job.id, VIDEO_URL).await.is_none());
    assert_eq!(extractor.download_count(), 1);

    let read = store.get(job.id).await.unwrap();
    assert_eq!(read.status, JobStatus::Completed);
    assert_eq!(read.files, first.files);
}

#[tokio::test]
async fn test_queue_notifies_and_drains_on_shutdown() {
    let (_dir, store, _extractor, pipeline) = pipeline(MockExtractor::new()).await;
    let queue = JobQueue::start(pipeline, 2, 8);

    let mut ids = Vec::new();
    for i in 0..4 {
        let job = store.create(&format!("{}/{}", VIDEO_URL, i)).await.unwrap();
        assert_ok!(queue.enqueue(QueuedJob::new(job.id, job.source_url.clone())));
        ids.push(job.id);
    }

    let mut outcomes = Vec::new();
    let mut notified = Vec::new();
    for _ in 0..2 {
        let job = store.create(VIDEO_URL).await.unwrap();
        let (queued, outcome) = QueuedJob::new(job.id, VIDEO_URL).with_notify();
        assert_ok!(queue.enqueue(queued));
        notified.push(job.id);
        outcomes.push(outcome);
    }

    let records = join_all(outcomes).await;
    for (record, id) in records.into_iter().zip(notified) {
        let record = record.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.status, JobStatus::Completed);
    }

    queue.shutdown().await;
    assert_eq!(statuses_of(&store, &ids).await, vec![JobStatus::Completed; 4]);
}

async fn statuses_of(store: &JobStore, ids: &[uuid::Uuid]) -> Vec<JobStatus> {
    let mut statuses = Vec::new();
    for id in ids {
        statuses.push(store.get(*id).await.unwrap().status);
    }
    statuses
}

#[tokio::test]
async fn test_enqueue_beyond_capacity_is_full() {
    let gate = Gate::new();
    let (_dir, store, _extractor, pipeline) = pipeline(MockExtractor::new().gated(gate.clone())).await;
    let queue = JobQueue::start(pipeline, 1, 2);

    let running = store.create(VIDEO_URL).await.unwrap();
    queue.enqueue(QueuedJob::new(running.id, VIDEO_URL)).unwrap();
    wait_for_status(&store, running.id, |s| s == JobStatus::Downloading).await;

    for _ in 0..2 {
        let job = store.create(VIDEO_URL).await.unwrap();
        queue.enqueue(QueuedJob::new(job.id, VIDEO_URL)).unwrap();
    }
    assert_eq!(queue.queue_depth(), 2);

    let overflow = store.create(VIDEO_URL).await.unwrap();
    let err = assert_err!(queue.enqueue(QueuedJob::new(overflow.id, VIDEO_URL)));
    assert!(matches!(err, QueueError::Full));

    gate.open();
    queue.shutdown().await;
    assert_eq!(store.get(running.id).await.unwrap().status, JobStatus::Completed);
    assert_eq!(store.get(overflow.id).await.unwrap().status, JobStatus::Pending);
}
