//! Error types for media operations.

use std::fmt;
use std::path::{Path, PathBuf};

use innova_models::EditSpecError;
use serde::Serialize;
use thiserror::Error;

/// Result type for low-level media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Result type for probing.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Result type for the transform pipeline.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors from running FFmpeg and touching the media directories.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

/// Errors from inspecting a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe could not read {path}: {message}")]
    Unreadable {
        path: PathBuf,
        message: String,
        stderr: Option<String>,
    },

    #[error("No decodable streams in {0}")]
    NoStreams(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Errors from the encode pool.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Encode queue is full ({waiting} waiting, limit {max_queued})")]
    Saturated { waiting: usize, max_queued: usize },

    #[error("Encode pool is closed")]
    Closed,
}

/// Where in the pipeline a transform failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformStage {
    /// Input or audio file does not exist
    InputMissing,
    /// Edit request failed validation
    InvalidSpec,
    /// No encode slot available
    Busy,
    /// The encoder reported an error
    EncodeFailed,
    /// The encode was cancelled
    Cancelled,
}

impl TransformStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformStage::InputMissing => "input-missing",
            TransformStage::InvalidSpec => "invalid-spec",
            TransformStage::Busy => "busy",
            TransformStage::EncodeFailed => "encode-failed",
            TransformStage::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed transform, tagged with the stage it failed at.
///
/// For `EncodeFailed` the cause holds the encoder's own error text.
#[derive(Debug, Clone, Error)]
#[error("{stage}: {cause}")]
pub struct TransformError {
    pub stage: TransformStage,
    pub cause: String,
}

impl TransformError {
    pub fn new(stage: TransformStage, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    pub fn input_missing(path: &Path) -> Self {
        Self::new(
            TransformStage::InputMissing,
            format!("File not found: {}", path.display()),
        )
    }

    pub fn invalid_spec(cause: impl Into<String>) -> Self {
        Self::new(TransformStage::InvalidSpec, cause)
    }

    pub fn encode_failed(cause: impl Into<String>) -> Self {
        Self::new(TransformStage::EncodeFailed, cause)
    }
}

impl From<EditSpecError> for TransformError {
    fn from(err: EditSpecError) -> Self {
        Self::invalid_spec(err.to_string())
    }
}

impl From<PoolError> for TransformError {
    fn from(err: PoolError) -> Self {
        Self::new(TransformStage::Busy, err.to_string())
    }
}

impl From<MediaError> for TransformError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => Self::new(TransformStage::Cancelled, "Encode cancelled"),
            MediaError::FileNotFound(path) => Self::input_missing(&path),
            MediaError::InvalidFileName(name) => {
                Self::invalid_spec(format!("Invalid file name: {}", name))
            }
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => {
                Self::encode_failed(format!("{}: {}", message, stderr.trim()))
            }
            other => Self::encode_failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(TransformStage::InputMissing.to_string(), "input-missing");
        assert_eq!(TransformStage::EncodeFailed.to_string(), "encode-failed");
        assert_eq!(
            serde_json::to_string(&TransformStage::InvalidSpec).unwrap(),
            "\"invalid-spec\""
        );
    }

    #[test]
    fn test_encoder_text_is_preserved() {
        let err: TransformError = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("Invalid duration specification for t: -3\n".to_string()),
            Some(1),
        )
        .into();
        assert_eq!(err.stage, TransformStage::EncodeFailed);
        assert!(err.cause.contains("Invalid duration specification"));
    }

    #[test]
    fn test_cancel_maps_to_cancelled_stage() {
        let err: TransformError = MediaError::Cancelled.into();
        assert_eq!(err.stage, TransformStage::Cancelled);
    }

    #[test]
    fn test_pool_saturation_maps_to_busy() {
        let err: TransformError = PoolError::Saturated {
            waiting: 4,
            max_queued: 4,
        }
        .into();
        assert_eq!(err.stage, TransformStage::Busy);
    }
}
