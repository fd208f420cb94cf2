//! Application state.

use std::sync::Arc;

use innova_media::{EncodePool, MediaLayout, MediaResult, TransformPipeline};

use crate::config::ApiConfig;
use crate::services::{InMemoryJobRepository, JobRepository, JobRunner};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub layout: MediaLayout,
    pub pipeline: TransformPipeline,
    pub jobs: JobRunner,
}

impl AppState {
    /// Create application state, creating the media directories if needed.
    pub async fn new(config: ApiConfig) -> MediaResult<Self> {
        let layout = MediaLayout::new(&config.upload_dir, &config.processed_dir);
        layout.ensure_dirs().await?;

        let pool = EncodePool::new(config.max_concurrent_encodes, config.max_queued_encodes);
        let pipeline = TransformPipeline::new(&config.processed_dir, pool)
            .with_timeout(config.encode_timeout.map(|t| t.as_secs()));

        let repository: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let jobs = JobRunner::new(pipeline.clone(), repository);

        Ok(Self {
            config,
            layout,
            pipeline,
            jobs,
        })
    }
}
