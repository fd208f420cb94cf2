//! Uploaded and processed file descriptors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of a completed multipart upload.
///
/// The pipeline only ever reads `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Unique stored name inside the uploads directory
    pub filename: String,
    /// Name the client sent
    pub original_name: String,
    /// Absolute local path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
}

/// Which directory a stored file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Uploaded,
    Processed,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Uploaded => "uploaded",
            FileKind::Processed => "processed",
        }
    }
}

/// Entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
}
