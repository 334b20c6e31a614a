//! Test helper utilities: in-process app construction and request helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use video_download_service::app_state::AppState;
use video_download_service::models::job::{Job, JobStatus};
use video_download_service::routes;
use video_download_service::services::extractor::MediaExtractor;
use video_download_service::services::job_store::JobStore;
use video_download_service::services::pipeline::Pipeline;
use video_download_service::services::queue::JobQueue;

/// A fully wired service over a temporary downloads directory.
pub struct TestApp {
    pub dir: TempDir,
    pub store: JobStore,
    pub queue: Arc<JobQueue>,
    pub router: Router,
}

pub async fn spawn_app(
    extractor: Arc<dyn MediaExtractor>,
    worker_count: usize,
    queue_capacity: usize,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::open(dir.path().join("downloads")).await.unwrap();
    let pipeline = Pipeline::new(store.clone(), extractor);
    let queue = Arc::new(JobQueue::start(pipeline, worker_count, queue_capacity));
    let state = AppState::new(store.clone(), Arc::clone(&queue));
    let router = routes::router(state, None, 64 * 1024);

    TestApp {
        dir,
        store,
        queue,
        router,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// POST an urlencoded form to `/download`.
    pub async fn submit(&self, form: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/download")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        let (status, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    /// Poll the store until the job reaches a terminal state.
    pub async fn wait_for_terminal(&self, id: Uuid) -> Job {
        wait_for_status(&self.store, id, |s| s.is_terminal()).await
    }
}

/// Poll `store` until the job's status satisfies `done` (5 s timeout).
pub async fn wait_for_status(store: &JobStore, id: Uuid, done: impl Fn(JobStatus) -> bool) -> Job {
    for _ in 0..200 {
        let job = store.get(id).await.unwrap();
        if done(job.status) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("job {} did not reach the expected status in time", id);
}

pub fn download_id(body: &Value) -> Uuid {
    let id = body["download_id"].as_str().expect("download_id missing");
    Uuid::parse_str(id).unwrap()
}
