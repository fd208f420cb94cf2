//! The transform pipeline: one edit request in, one re-encoded file out.

use std::path::{Path, PathBuf};
use std::time::Instant;

use innova_models::{AudioMode, EditSpec, EncodingConfig};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::command::{wait_for_cancel, FfmpegCommand, FfmpegRunner};
use crate::error::{TransformError, TransformResult, TransformStage};
use crate::filters::FilterGraph;
use crate::fs_utils::remove_if_exists;
use crate::pool::EncodePool;
use crate::probe::probe_duration;
use crate::progress::ProgressCallback;

/// Metric names recorded by the pipeline.
pub mod metric_names {
    pub const ENCODES_TOTAL: &str = "innova_encodes_total";
    pub const ENCODE_DURATION: &str = "innova_encode_duration_seconds";
    pub const ENCODES_ACTIVE: &str = "innova_encodes_active";
}

/// Replacement audio, padded with silence so it never shortens the video.
const REPLACE_AUDIO_GRAPH: &str = "[1:a:0]apad[aout]";

/// Original and added audio mixed, the added track at half volume.
const MIX_AUDIO_GRAPH: &str = "[1:a]volume=0.5[a1];[0:a][a1]amix=inputs=2:duration=first[aout]";

/// Per-call hooks for a transform.
#[derive(Default)]
pub struct TransformOptions {
    /// Receives encoder progress snapshots.
    pub progress: Option<ProgressCallback>,
    /// Sending `true` kills the encoder.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl TransformOptions {
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Runs edit requests against FFmpeg.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    processed_dir: PathBuf,
    encoding: EncodingConfig,
    pool: EncodePool,
    timeout_secs: Option<u64>,
}

impl TransformPipeline {
    pub fn new(processed_dir: impl Into<PathBuf>, pool: EncodePool) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            encoding: EncodingConfig::default(),
            pool,
            timeout_secs: None,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn pool(&self) -> &EncodePool {
        &self.pool
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Where the output of `spec` will be written.
    pub fn output_path(&self, spec: &EditSpec) -> PathBuf {
        self.processed_dir.join(&spec.output_name)
    }

    /// Apply `spec` and return the output path.
    pub async fn transform(&self, spec: &EditSpec) -> TransformResult<PathBuf> {
        self.transform_with(spec, TransformOptions::default()).await
    }

    /// Apply `spec` with progress reporting and cancellation.
    pub async fn transform_with(
        &self,
        spec: &EditSpec,
        options: TransformOptions,
    ) -> TransformResult<PathBuf> {
        let output = self.preflight(spec).await?;
        let cmd = self.build_command(spec, &output);

        // Waiting for a slot is cancellable too.
        let acquired = tokio::select! {
            acquired = self.pool.acquire() => acquired,
            _ = wait_for_cancel(options.cancel.clone()) => {
                metrics::counter!(metric_names::ENCODES_TOTAL, "status" => "cancelled").increment(1);
                return Err(TransformError::new(TransformStage::Cancelled, "Cancelled before encoding started"));
            }
        };
        let _permit = acquired.map_err(|e| {
            metrics::counter!(metric_names::ENCODES_TOTAL, "status" => "busy").increment(1);
            warn!(output = %spec.output_name, "Encode rejected: {}", e);
            TransformError::from(e)
        })?;

        info!(
            input = %spec.input_path.display(),
            output = %output.display(),
            overlays = spec.text_overlays.len(),
            trim = spec.trim.is_some(),
            audio = spec.audio.as_ref().map(|a| a.mode.as_str()),
            "Starting encode"
        );
        debug!("Encode command: {}", cmd.command_line());

        let mut runner = FfmpegRunner::new();
        if let Some(cancel) = options.cancel {
            runner = runner.with_cancel(cancel);
        }
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }

        let started = Instant::now();
        metrics::gauge!(metric_names::ENCODES_ACTIVE).increment(1.0);
        let result = match options.progress {
            Some(callback) => runner.run_with_progress(&cmd, callback).await,
            None => runner.run(&cmd).await,
        };
        metrics::gauge!(metric_names::ENCODES_ACTIVE).decrement(1.0);
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                metrics::counter!(metric_names::ENCODES_TOTAL, "status" => "completed")
                    .increment(1);
                metrics::histogram!(metric_names::ENCODE_DURATION).record(elapsed);
                info!(
                    output = %output.display(),
                    elapsed_secs = elapsed,
                    "Encode completed"
                );
                Ok(output)
            }
            Err(e) => {
                let err = TransformError::from(e);
                metrics::counter!(metric_names::ENCODES_TOTAL, "status" => err.stage.as_str())
                    .increment(1);
                error!(
                    output = %output.display(),
                    stage = %err.stage,
                    "Encode failed: {}",
                    err.cause
                );
                if let Err(cleanup) = remove_if_exists(&output).await {
                    warn!("Could not remove partial output: {}", cleanup);
                }
                Err(err)
            }
        }
    }

    /// Checks that must pass before any encoder is started.
    async fn preflight(&self, spec: &EditSpec) -> TransformResult<PathBuf> {
        spec.validate()?;

        if !exists(&spec.input_path).await {
            return Err(TransformError::input_missing(&spec.input_path));
        }
        if let Some(audio) = &spec.audio {
            if !exists(&audio.path).await {
                return Err(TransformError::input_missing(&audio.path));
            }
        }

        let output = self.output_path(spec);
        if exists(&output).await {
            return Err(TransformError::invalid_spec(format!(
                "Output already exists: {}",
                spec.output_name
            )));
        }
        Ok(output)
    }

    /// Build the encoder invocation for `spec`.
    pub fn build_command(&self, spec: &EditSpec, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&spec.input_path, output);

        if let Some(trim) = &spec.trim {
            cmd = cmd.seek(trim.start).duration(trim.duration());
        }

        if let Some(vf) = FilterGraph::from_spec(spec).to_filter_string() {
            cmd = cmd.video_filter(vf);
        }

        if let Some(audio) = &spec.audio {
            cmd = cmd.add_input(&audio.path);
            cmd = match audio.mode {
                AudioMode::Replace => cmd
                    .filter_complex(REPLACE_AUDIO_GRAPH)
                    .map("0:v:0")
                    .map("[aout]")
                    .shortest(),
                AudioMode::Mix => cmd
                    .filter_complex(MIX_AUDIO_GRAPH)
                    .map("0:v:0")
                    .map("[aout]"),
            };
        }

        cmd.encoding(&self.encoding)
    }

    /// Expected output length in milliseconds: the trim length, or the
    /// probed input duration. `None` when neither is known.
    pub async fn expected_output_ms(&self, spec: &EditSpec) -> Option<i64> {
        if let Some(trim) = &spec.trim {
            return Some((trim.duration() * 1000.0) as i64);
        }
        match probe_duration(&spec.input_path).await {
            Ok(secs) if secs > 0.0 => Some((secs * 1000.0) as i64),
            Ok(_) => None,
            Err(e) => {
                debug!("Could not probe duration for progress: {}", e);
                None
            }
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
