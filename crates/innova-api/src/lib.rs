//! Axum HTTP API server for the INNOVA media backend.
//!
//! This crate provides:
//! - Upload, probe, edit and download endpoints over the media pipeline
//! - Background encode jobs with progress and cancellation
//! - Image background removal
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{JobReaper, JobRunner};
pub use state::AppState;
