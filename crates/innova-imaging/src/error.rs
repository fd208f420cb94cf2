//! Error types for segmentation.

use thiserror::Error;

pub type SegmentationResult<T> = Result<T, SegmentationError>;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Could not encode PNG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Image has no pixels")]
    EmptyImage,
}
