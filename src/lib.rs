//! Video Download Service
//!
//! A small web front end over `yt-dlp`: submitted URLs become download jobs
//! processed by a bounded worker pool, each stored in its own directory
//! with a `metadata.json` sidecar tracking status and extracted metadata.

pub mod app_state;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
