//! Shared data models for the INNOVA media backend.
//!
//! This crate provides Serde-serializable types for:
//! - Declarative video edit requests
//! - Probed media metadata
//! - Encoding configuration
//! - Encode jobs and uploaded files

pub mod edit;
pub mod encoding;
pub mod job;
pub mod media;
pub mod upload;

// Re-export common types
pub use edit::{
    AudioMode, AudioTrack, ColorFilters, EditSpec, EditSpecError, TextOverlay, TrimWindow,
};
pub use encoding::EncodingConfig;
pub use job::{Job, JobId, JobState};
pub use media::MediaMetadata;
pub use upload::{FileKind, StoredFile, UploadedFile};
