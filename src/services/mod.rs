pub mod extractor;
pub mod job_store;
pub mod pipeline;
pub mod queue;
pub mod sanitize;
