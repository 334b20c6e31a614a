use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use video_download_service::{
    app_state::AppState,
    config::{AppConfig, ExtractorConfig},
    routes,
    services::{
        extractor::YtDlpExtractor, job_store::JobStore, pipeline::Pipeline, queue::JobQueue,
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing video download service");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("download_jobs_total", "Total download jobs queued");
    metrics::describe_counter!("download_jobs_completed", "Total download jobs completed");
    metrics::describe_counter!("download_jobs_failed", "Total download jobs that failed");
    metrics::describe_histogram!(
        "download_processing_seconds",
        "Time to extract info, download and store a job"
    );
    metrics::describe_gauge!(
        "download_queue_depth",
        "Current number of jobs waiting for a worker"
    );
    metrics::describe_gauge!(
        "download_jobs_in_flight",
        "Current number of jobs being processed"
    );

    // Extractor pass-through configuration (optional file)
    let extractor_config = ExtractorConfig::load(&config.extractor_config)
        .expect("Failed to load extractor configuration");

    // Open the storage root
    tracing::info!(downloads_dir = %config.downloads_dir.display(), "Opening job store");
    let store = JobStore::open(&config.downloads_dir)
        .await
        .expect("Failed to open downloads directory");

    // Start the worker pool
    let extractor = Arc::new(YtDlpExtractor::new(
        &config.ytdlp_bin,
        &config.ytdlp_format,
        extractor_config,
    ));
    let pipeline = Pipeline::new(store.clone(), extractor);
    let queue = Arc::new(JobQueue::start(
        pipeline,
        config.worker_count,
        config.queue_capacity,
    ));

    // Create shared application state
    let state = AppState::new(store, Arc::clone(&queue));
    let app = routes::router(state, Some(prometheus_handle), config.max_body_bytes);

    tracing::info!("Starting video download service on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    match Arc::try_unwrap(queue) {
        Ok(queue) => queue.shutdown().await,
        Err(_) => tracing::warn!("Download queue still referenced, skipping drain"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
