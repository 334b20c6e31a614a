use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use garde::Validate;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::download::{DownloadRequest, DownloadResult, FilesResponse, SubmitResponse};
use crate::models::job::{Job, JobStatus};
use crate::services::queue::QueuedJob;

/// POST /download: queue a URL for download.
///
/// Returns `202 {download_id, status}` right away, or with `wait=true`
/// blocks until the job finishes and returns the [`DownloadResult`].
pub async fn submit_download(
    State(state): State<AppState>,
    form: Result<Form<DownloadRequest>, FormRejection>,
) -> Result<Response, AppError> {
    let Form(mut request) = form.map_err(|e| AppError::Validation(e.body_text()))?;
    request.url = request.url.trim().to_string();
    request.validate()?;

    let job = state.store.create(&request.url).await?;
    let queued = QueuedJob::new(job.id, request.url.clone());

    if request.wait.unwrap_or(false) {
        let (queued, outcome) = queued.with_notify();
        enqueue_or_fail(&state, queued).await?;

        let record = outcome
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AppError::Internal("Download outcome unavailable".to_string()))?;
        let status = match record.status {
            JobStatus::Completed => StatusCode::OK,
            _ => StatusCode::BAD_GATEWAY,
        };
        return Ok((status, Json(DownloadResult::from(record))).into_response());
    }

    enqueue_or_fail(&state, queued).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            download_id: job.id,
            status: job.status,
        }),
    )
        .into_response())
}

/// A job that never made it into the queue is failed right away so that
/// polling clients see a terminal state.
async fn enqueue_or_fail(state: &AppState, queued: QueuedJob) -> Result<(), AppError> {
    let job_id = queued.job_id;
    if let Err(e) = state.queue.enqueue(queued) {
        state.store.fail(job_id, &e.to_string()).await;
        return Err(e.into());
    }
    Ok(())
}

/// GET /status/{download_id}: full job record.
pub async fn get_status(
    State(state): State<AppState>,
    Path(download_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    let job = state.store.get_status(&download_id).await?;
    Ok(Json(job))
}

/// GET /files: summaries of every known download.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<FilesResponse>, AppError> {
    let downloads = state.store.list().await?;
    Ok(Json(FilesResponse { downloads }))
}
