//! Asynchronous encode jobs.
//!
//! A submitted edit is validated up front, recorded as a pending [`Job`] and
//! run on a background task. Progress is stored as a percentage of the
//! expected output length so clients can poll it. Each running job keeps a
//! cancel sender that kills its encoder.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use innova_media::{remove_if_exists, TransformError, TransformOptions, TransformPipeline, TransformStage};
use innova_models::{EditSpec, Job, JobId, JobState};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::metrics;

/// What a cancel request did to a stored job.
#[derive(Debug, Clone)]
pub enum CancelOutcome {
    /// The job is now cancelled, or already was.
    Cancelled(Job),
    /// The job had completed or failed and was left untouched.
    AlreadyFinished(Job),
}

impl CancelOutcome {
    pub fn job(&self) -> &Job {
        match self {
            Self::Cancelled(job) | Self::AlreadyFinished(job) => job,
        }
    }
}

/// Storage for job records.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: Job);

    async fn get(&self, id: &JobId) -> Option<Job>;

    /// Record progress. Ignored for unknown or finished jobs.
    async fn update_progress(&self, id: &JobId, percent: f64);

    /// Mark completed. Returns false if the job was already finished.
    async fn complete(&self, id: &JobId, download_url: String) -> bool;

    /// Mark failed. Returns false if the job was already finished.
    async fn fail(&self, id: &JobId, error: String) -> bool;

    /// Mark cancelled unless already finished, in one step. `None` for an
    /// unknown id.
    async fn cancel_requested(&self, id: &JobId) -> Option<CancelOutcome>;

    /// Drop finished jobs last updated more than `older_than` ago.
    async fn purge_finished(&self, older_than: Duration) -> usize;
}

/// Process-local job store.
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to an unfinished job. Returns whether it ran.
    async fn update_active<F>(&self, id: &JobId, f: F) -> bool
    where
        F: FnOnce(&mut Job) + Send,
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(job) if !job.state.is_terminal() => {
                f(job);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    async fn update_progress(&self, id: &JobId, percent: f64) {
        self.update_active(id, |job| job.set_progress(percent)).await;
    }

    async fn complete(&self, id: &JobId, download_url: String) -> bool {
        self.update_active(id, |job| job.mark_completed(download_url))
            .await
    }

    async fn fail(&self, id: &JobId, error: String) -> bool {
        self.update_active(id, |job| job.mark_failed(error)).await
    }

    async fn cancel_requested(&self, id: &JobId) -> Option<CancelOutcome> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id)?;
        let outcome = match job.state {
            JobState::Completed | JobState::Failed => CancelOutcome::AlreadyFinished(job.clone()),
            JobState::Cancelled => CancelOutcome::Cancelled(job.clone()),
            JobState::Pending | JobState::Processing => {
                job.mark_cancelled();
                CancelOutcome::Cancelled(job.clone())
            }
        };
        Some(outcome)
    }

    async fn purge_finished(&self, older_than: Duration) -> usize {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            let expired = (now - job.updated_at)
                .to_std()
                .map(|age| age >= older_than)
                .unwrap_or(false);
            !(job.state.is_terminal() && expired)
        });
        before - jobs.len()
    }
}

/// Download path for a processed file.
pub fn download_url(output_name: &str) -> String {
    format!("/api/video/download/{}", output_name)
}

/// Spawns transforms as background jobs and tracks their cancel handles.
#[derive(Clone)]
pub struct JobRunner {
    pipeline: TransformPipeline,
    repository: Arc<dyn JobRepository>,
    cancels: Arc<RwLock<HashMap<JobId, watch::Sender<bool>>>>,
}

impl JobRunner {
    pub fn new(pipeline: TransformPipeline, repository: Arc<dyn JobRepository>) -> Self {
        Self {
            pipeline,
            repository,
            cancels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.repository
    }

    /// Validate and start `spec`, returning the pending job.
    ///
    /// Validation failures are returned directly and no job is created.
    pub async fn submit(&self, spec: EditSpec) -> Result<Job, TransformError> {
        spec.validate()?;

        let job = Job::new(spec.output_name.clone());
        let (cancel_tx, cancel_rx) = watch::channel(false);

        self.repository.insert(job.clone()).await;
        self.cancels.write().await.insert(job.id.clone(), cancel_tx);
        metrics::record_job_submitted();
        info!(job_id = %job.id, output = %job.output_name, "Job submitted");

        let runner = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            runner.run(job_id, spec, cancel_rx).await;
        });

        Ok(job)
    }

    async fn run(&self, job_id: JobId, spec: EditSpec, cancel_rx: watch::Receiver<bool>) {
        let expected_ms = self.pipeline.expected_output_ms(&spec).await;

        // The encoder callback is synchronous; forward snapshots to the store.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<f64>();
        let forwarder = {
            let repository = Arc::clone(&self.repository);
            let job_id = job_id.clone();
            tokio::spawn(async move {
                while let Some(percent) = progress_rx.recv().await {
                    repository.update_progress(&job_id, percent).await;
                }
            })
        };

        let options = TransformOptions::default()
            .with_cancel(cancel_rx)
            .with_progress(Box::new(move |progress| {
                let percent = expected_ms
                    .map(|total| progress.percentage(total))
                    .unwrap_or(0.0);
                let _ = progress_tx.send(percent);
            }));

        let result = self.pipeline.transform_with(&spec, options).await;
        // The callback (and its sender) is gone once the transform returns.
        let _ = forwarder.await;

        match result {
            Ok(path) => {
                if self
                    .repository
                    .complete(&job_id, download_url(&spec.output_name))
                    .await
                {
                    metrics::record_job_finished("completed");
                    info!(job_id = %job_id, output = %path.display(), "Job completed");
                } else {
                    // Cancelled after the encoder had already finished.
                    debug!(job_id = %job_id, "Discarding output of cancelled job");
                    if let Err(e) = remove_if_exists(&path).await {
                        warn!(job_id = %job_id, "Could not remove output: {}", e);
                    }
                }
            }
            Err(err) if err.stage == TransformStage::Cancelled => {
                self.repository.cancel_requested(&job_id).await;
                metrics::record_job_finished("cancelled");
                info!(job_id = %job_id, "Job cancelled");
            }
            Err(err) => {
                self.repository.fail(&job_id, err.to_string()).await;
                metrics::record_job_finished("failed");
                error!(job_id = %job_id, stage = %err.stage, "Job failed: {}", err.cause);
            }
        }

        self.cancels.write().await.remove(&job_id);
    }

    /// Request cancellation. The record is marked before the encoder is
    /// signalled, so an encode finishing in between has its output discarded.
    pub async fn cancel(&self, id: &JobId) -> Option<CancelOutcome> {
        let outcome = self.repository.cancel_requested(id).await?;
        if let CancelOutcome::Cancelled(_) = outcome {
            if let Some(tx) = self.cancels.read().await.get(id) {
                let _ = tx.send(true);
            }
        }
        Some(outcome)
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.repository.get(id).await
    }
}

/// Interval between purge runs.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that forgets finished jobs after a TTL.
pub struct JobReaper {
    repository: Arc<dyn JobRepository>,
    ttl: Duration,
}

impl JobReaper {
    pub fn new(repository: Arc<dyn JobRepository>, ttl: Duration) -> Self {
        Self { repository, ttl }
    }

    /// Run forever. Spawn as a background task.
    pub async fn run(&self) {
        info!("Starting job reaper (ttl: {:?}, interval: {:?})", self.ttl, REAP_INTERVAL);

        let mut ticker = interval(REAP_INTERVAL);
        loop {
            ticker.tick().await;
            self.reap_once().await;
        }
    }

    pub async fn reap_once(&self) -> usize {
        let purged = self.repository.purge_finished(self.ttl).await;
        if purged > 0 {
            info!("Purged {} finished jobs", purged);
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innova_media::EncodePool;
    use tempfile::TempDir;

    fn runner(dir: &TempDir) -> JobRunner {
        let pipeline = TransformPipeline::new(dir.path(), EncodePool::new(1, 0));
        JobRunner::new(pipeline, Arc::new(InMemoryJobRepository::new()))
    }

    async fn wait_terminal(runner: &JobRunner, id: &JobId) -> Job {
        for _ in 0..100 {
            if let Some(job) = runner.get(id).await {
                if job.state.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", id);
    }

    #[tokio::test]
    async fn test_repository_lifecycle() {
        let repo = InMemoryJobRepository::new();
        let job = Job::new("out.mp4");
        let id = job.id.clone();
        repo.insert(job).await;

        repo.update_progress(&id, 25.0).await;
        let stored = repo.get(&id).await.unwrap();
        assert_eq!(stored.state, JobState::Processing);
        assert!((stored.progress_percent - 25.0).abs() < f64::EPSILON);

        assert!(repo.complete(&id, download_url("out.mp4")).await);
        assert!(!repo.fail(&id, "late".to_string()).await);

        let stored = repo.get(&id).await.unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(
            stored.download_url.as_deref(),
            Some("/api/video/download/out.mp4")
        );

        // Cancelling a finished job leaves it alone.
        match repo.cancel_requested(&id).await.unwrap() {
            CancelOutcome::AlreadyFinished(job) => assert_eq!(job.state, JobState::Completed),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(repo.cancel_requested(&JobId::from_string("nope")).await.is_none());
    }

    #[tokio::test]
    async fn test_purge_only_removes_finished_jobs() {
        let repo = InMemoryJobRepository::new();
        let running = Job::new("a.mp4");
        let finished = Job::new("b.mp4");
        let (running_id, finished_id) = (running.id.clone(), finished.id.clone());
        repo.insert(running).await;
        repo.insert(finished).await;
        repo.fail(&finished_id, "boom".to_string()).await;

        assert_eq!(repo.purge_finished(Duration::from_secs(3600)).await, 0);
        assert_eq!(repo.purge_finished(Duration::ZERO).await, 1);
        assert!(repo.get(&finished_id).await.is_none());
        assert!(repo.get(&running_id).await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_spec_creates_no_job() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let spec = EditSpec::new(dir.path().join("in.mp4"), "out.mp4").with_trim(4.0, 1.0);

        let err = runner.submit(spec).await.unwrap_err();
        assert_eq!(err.stage, TransformStage::InvalidSpec);
    }

    #[tokio::test]
    async fn test_missing_input_fails_job() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir);
        let spec = EditSpec::new(dir.path().join("missing.mp4"), "out.mp4").with_trim(0.0, 1.0);

        let job = runner.submit(spec).await.unwrap();
        assert_eq!(job.state, JobState::Pending);

        let done = wait_terminal(&runner, &job.id).await;
        assert_eq!(done.state, JobState::Failed);
        assert!(done.error.unwrap().contains("input-missing"));
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        tokio::fs::write(&input, b"x").await.unwrap();

        let pipeline = TransformPipeline::new(dir.path(), EncodePool::new(1, 4));
        let _held = pipeline.pool().acquire().await.unwrap();
        let runner = JobRunner::new(pipeline, Arc::new(InMemoryJobRepository::new()));

        let job = runner
            .submit(EditSpec::new(&input, "out.mp4").with_trim(0.0, 1.0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancelled = runner.cancel(&job.id).await.unwrap();
        assert!(matches!(cancelled, CancelOutcome::Cancelled(_)));
        assert_eq!(cancelled.job().state, JobState::Cancelled);

        let done = wait_terminal(&runner, &job.id).await;
        assert_eq!(done.state, JobState::Cancelled);
        assert!(runner.cancel(&JobId::from_string("nope")).await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_is_decided_under_one_lock() {
        let repo = Arc::new(InMemoryJobRepository::new());
        let job = Job::new("race.mp4");
        let id = job.id.clone();
        repo.insert(job).await;

        // Completion and cancellation race; exactly one of them wins.
        let completer = {
            let repo = Arc::clone(&repo);
            let id = id.clone();
            tokio::spawn(async move { repo.complete(&id, download_url("race.mp4")).await })
        };
        let outcome = repo.cancel_requested(&id).await.unwrap();
        let completed = completer.await.unwrap();

        let stored = repo.get(&id).await.unwrap();
        match outcome {
            CancelOutcome::Cancelled(job) => {
                assert!(!completed);
                assert_eq!(job.state, JobState::Cancelled);
                assert_eq!(stored.state, JobState::Cancelled);
            }
            CancelOutcome::AlreadyFinished(job) => {
                assert!(completed);
                assert_eq!(job.state, JobState::Completed);
                assert_eq!(stored.state, JobState::Completed);
            }
        }

        // A repeated cancel is a no-op that still reports the stored job.
        let failed = Job::new("f.mp4");
        let failed_id = failed.id.clone();
        repo.insert(failed).await;
        repo.fail(&failed_id, "boom".to_string()).await;
        assert!(matches!(
            repo.cancel_requested(&failed_id).await,
            Some(CancelOutcome::AlreadyFinished(_))
        ));
    }

    #[tokio::test]
    async fn test_reaper_purges_expired() {
        let repo: Arc<dyn JobRepository> = Arc::new(InMemoryJobRepository::new());
        let job = Job::new("c.mp4");
        let id = job.id.clone();
        repo.insert(job).await;
        repo.cancel_requested(&id).await;

        let reaper = JobReaper::new(Arc::clone(&repo), Duration::ZERO);
        assert_eq!(reaper.reap_once().await, 1);
        assert!(repo.get(&id).await.is_none());
    }
}
