use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

pub mod downloads;
pub mod health;
pub mod index;
pub mod metrics;

/// Build the HTTP router. `/metrics` is only mounted when a Prometheus
/// recorder has been installed.
pub fn router(
    state: AppState,
    prometheus: Option<Arc<PrometheusHandle>>,
    max_body_bytes: usize,
) -> Router {
    let downloads = ServeDir::new(state.store.root());

    let mut app = Router::new()
        .route("/", get(index::index))
        .route("/health", get(health::health_check))
        .route("/download", post(downloads::submit_download))
        .route("/status/{download_id}", get(downloads::get_status))
        .route("/files", get(downloads::list_files))
        .nest_service("/downloads", downloads)
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(handle),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
}
