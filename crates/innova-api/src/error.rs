//! API error types.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use innova_imaging::SegmentationError;
use innova_media::{MediaError, ProbeError, TransformError, TransformStage};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Service busy: {0}")]
    Busy(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ProcessingFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Unprocessable(_) => "unprocessable",
            ApiError::Busy(_) => "busy",
            ApiError::ProcessingFailed(_) => "processing_failed",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl From<TransformError> for ApiError {
    fn from(err: TransformError) -> Self {
        match err.stage {
            TransformStage::InputMissing => Self::NotFound(err.cause),
            TransformStage::InvalidSpec => Self::BadRequest(err.cause),
            TransformStage::Busy => Self::Busy(err.cause),
            TransformStage::Cancelled => Self::Conflict(err.cause),
            TransformStage::EncodeFailed => Self::ProcessingFailed(err.cause),
        }
    }
}

impl From<ProbeError> for ApiError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::NotFound(_) => Self::NotFound("File not found".to_string()),
            ProbeError::NoStreams(_) | ProbeError::Unreadable { .. } => {
                Self::Unprocessable(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::InvalidFileName(name) => {
                Self::BadRequest(format!("Invalid file name: {}", name))
            }
            MediaError::FileNotFound(_) => Self::NotFound("File not found".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SegmentationError> for ApiError {
    fn from(err: SegmentationError) -> Self {
        match err {
            SegmentationError::InvalidDataUrl(_) | SegmentationError::Base64(_) => {
                Self::BadRequest(err.to_string())
            }
            SegmentationError::Decode(_) => Self::Unprocessable("Could not read image".to_string()),
            SegmentationError::EmptyImage => Self::Unprocessable(err.to_string()),
            SegmentationError::Encode(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let production = std::env::var("ENVIRONMENT").unwrap_or_default() == "production";
        let detail = match &self {
            ApiError::ProcessingFailed(_) if production => "Processing failed".to_string(),
            ApiError::Internal(_) if production => "An internal error occurred".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
