use std::sync::Arc;

use crate::services::{job_store::JobStore, queue::JobQueue};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(store: JobStore, queue: Arc<JobQueue>) -> Self {
        Self { store, queue }
    }
}
