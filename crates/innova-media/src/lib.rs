#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the INNOVA video pipeline.
//!
//! This crate provides:
//! - Media probing through ffprobe
//! - A typed filter graph for color correction and text overlays
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - A bounded encode pool and the transform pipeline itself

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod transform;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{
    MediaError, MediaResult, PoolError, ProbeError, ProbeResult, TransformError, TransformResult,
    TransformStage,
};
pub use filters::{DrawText, FilterGraph, FilterOp, TimeWindow};
pub use fs_utils::{remove_if_exists, unique_file_name, MediaLayout};
pub use pool::{EncodePermit, EncodePool, PoolStats};
pub use probe::{probe, probe_duration};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use transform::{TransformOptions, TransformPipeline};
