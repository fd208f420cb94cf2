//! Video API handlers.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, Request};
use axum::response::Response;
use axum::Json;
use innova_media::{probe, remove_if_exists, unique_file_name, MediaLayout};
use innova_models::{
    AudioMode, AudioTrack, ColorFilters, EditSpec, FileKind, MediaMetadata, StoredFile,
    TextOverlay, TrimWindow, UploadedFile,
};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::download_url;
use crate::state::AppState;

/// Multipart field carrying the media file.
const UPLOAD_FIELD: &str = "video";

/// Extensions accepted by the upload endpoint.
const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "mp3", "wav", "aac"];

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file: UploadedFileInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileInfo {
    #[serde(flatten)]
    pub file: UploadedFile,
    /// Probed duration in seconds, absent when the file could not be probed
    pub duration: Option<f64>,
    pub format: Option<String>,
}

/// Lowercased extension of a client file name, if it is on the allowlist.
fn allowed_extension(file_name: &str) -> Option<String> {
    let ext = FsPath::new(file_name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Clients are inconsistent about media types; only reject ones that are clearly wrong.
fn acceptable_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            ct.starts_with("video/")
                || ct.starts_with("audio/")
                || ct == "application/octet-stream"
        }
    }
}

/// Upload a video or audio file.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let ext = allowed_extension(&original_name).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Unsupported file type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;
        if !acceptable_content_type(field.content_type()) {
            return Err(ApiError::bad_request(format!(
                "Unsupported content type: {}",
                field.content_type().unwrap_or_default()
            )));
        }

        let filename = unique_file_name("video", &ext);
        let path = state.layout.upload_path(&filename)?;

        let size = match store_field(&mut field, &path).await {
            Ok(size) => size,
            Err(e) => {
                discard_partial_upload(&path).await;
                return Err(e);
            }
        };
        metrics::record_upload(size);

        let (duration, format) = match probe(&path).await {
            Ok(meta) => (Some(meta.duration_seconds), Some(meta.container_format)),
            Err(e) => {
                warn!(file = %filename, "Uploaded file could not be probed: {}", e);
                (None, None)
            }
        };

        info!(file = %filename, original = %original_name, size, "File uploaded");

        return Ok(Json(UploadResponse {
            success: true,
            message: "File uploaded successfully".to_string(),
            file: UploadedFileInfo {
                file: UploadedFile {
                    filename,
                    original_name,
                    path,
                    size,
                },
                duration,
                format,
            },
        }));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// Stream a multipart field to disk. Returns bytes written.
async fn store_field(
    field: &mut axum::extract::multipart::Field<'_>,
    path: &FsPath,
) -> ApiResult<u64> {
    let mut file = File::create(path).await?;
    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(size)
}

/// Remove what a failed upload left behind. Returns whether the path is gone.
async fn discard_partial_upload(path: &FsPath) -> bool {
    match remove_if_exists(path).await {
        Ok(_) => true,
        Err(e) => {
            warn!(path = %path.display(), "Could not remove partial upload: {}", e);
            false
        }
    }
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub info: MediaMetadata,
}

/// Probe an uploaded file.
pub async fn info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<InfoResponse>> {
    let path = state.layout.upload_path(&filename)?;
    let info = probe(&path).await?;
    Ok(Json(InfoResponse {
        success: true,
        info,
    }))
}

/// Edit request as sent by clients. File names refer to the uploads directory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub input_file: String,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub trim: Option<TrimWindow>,
    #[serde(default)]
    pub filters: Option<ColorFilters>,
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
    #[serde(default)]
    pub audio_file: Option<String>,
    #[serde(default)]
    pub audio_mode: AudioMode,
}

impl ProcessRequest {
    /// Resolve file names against the layout.
    pub fn into_spec(self, layout: &MediaLayout) -> ApiResult<EditSpec> {
        if self.input_file.is_empty() {
            return Err(ApiError::bad_request("Input file is required"));
        }
        let input_path = layout.upload_path(&self.input_file)?;
        let output_name = self
            .output_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_output_name);

        let audio = self
            .audio_file
            .filter(|name| !name.is_empty())
            .map(|name| layout.upload_path(&name))
            .transpose()?
            .map(|path| AudioTrack::new(path, self.audio_mode));

        Ok(EditSpec {
            input_path,
            output_name,
            trim: self.trim,
            filters: self.filters,
            text_overlays: self.text_overlays,
            audio,
        })
    }
}

/// `processed_<unix-ms>_<random>.mp4`
fn default_output_name() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("processed_{}_{}.mp4", millis, &random[..8])
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub output_file: String,
    pub download_url: String,
}

/// Run an edit and wait for the encoder to finish.
pub async fn process(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    let spec = request.into_spec(&state.layout)?;
    let output = state.pipeline.transform(&spec).await?;

    info!(output = %output.display(), "Video processed");

    Ok(Json(ProcessResponse {
        success: true,
        message: "Video processed successfully".to_string(),
        download_url: download_url(&spec.output_name),
        output_file: spec.output_name,
    }))
}

/// Stream a processed file as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let path = state.layout.processed_path(&filename)?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(ApiError::not_found("File not found"));
    }

    let response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let mut response = response.map(Body::new);

    if response.status().is_success() {
        let disposition = format!("attachment; filename=\"{}\"", filename);
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok(response)
}

#[derive(Serialize)]
pub struct FilesResponse {
    pub success: bool,
    pub files: FileListing,
}

#[derive(Serialize)]
pub struct FileListing {
    pub uploaded: Vec<StoredFile>,
    pub processed: Vec<StoredFile>,
}

/// List uploaded and processed files.
pub async fn files(State(state): State<AppState>) -> ApiResult<Json<FilesResponse>> {
    let uploaded = state.layout.list(FileKind::Uploaded).await?;
    let processed = state.layout.list(FileKind::Processed).await?;
    Ok(Json(FilesResponse {
        success: true,
        files: FileListing {
            uploaded,
            processed,
        },
    }))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    /// Whether anything existed to delete
    pub removed: bool,
}

/// Delete a file from both directories. Deleting a missing file succeeds.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let removed = state.layout.delete_everywhere(&filename).await?;
    if removed {
        info!(file = %filename, "File deleted");
    }
    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
        removed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("clip.MP4").as_deref(), Some("mp4"));
        assert_eq!(allowed_extension("song.wav").as_deref(), Some("wav"));
        assert_eq!(allowed_extension("notes.txt"), None);
        assert_eq!(allowed_extension("noext"), None);
    }

    #[test]
    fn test_content_type_leniency() {
        assert!(acceptable_content_type(None));
        assert!(acceptable_content_type(Some("video/mp4")));
        assert!(acceptable_content_type(Some("audio/mpeg")));
        assert!(acceptable_content_type(Some("application/octet-stream")));
        assert!(!acceptable_content_type(Some("text/html")));
    }

    #[tokio::test]
    async fn test_discard_partial_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let partial = dir.path().join("video-1.mp4");
        tokio::fs::write(&partial, b"half").await.unwrap();

        assert!(discard_partial_upload(&partial).await);
        assert!(!partial.exists());
        // Nothing to remove is not a failure.
        assert!(discard_partial_upload(&partial).await);
        // A path that cannot be unlinked is reported, not swallowed.
        assert!(!discard_partial_upload(dir.path()).await);
        assert!(dir.path().exists());
    }

    #[test]
    fn test_process_request_into_spec() {
        let layout = MediaLayout::new("/srv/uploads", "/srv/processed");
        let request: ProcessRequest = serde_json::from_value(serde_json::json!({
            "inputFile": "video-1.mp4",
            "outputName": "out.mp4",
            "trim": {"start": 1.0, "end": 4.0},
            "textOverlays": [{"text": "Hi"}],
            "audioFile": "song.mp3",
            "audioMode": "mix"
        }))
        .unwrap();

        let spec = request.into_spec(&layout).unwrap();
        assert_eq!(spec.input_path, PathBuf::from("/srv/uploads/video-1.mp4"));
        assert_eq!(spec.output_name, "out.mp4");
        assert_eq!(spec.trim, Some(TrimWindow::new(1.0, 4.0)));
        assert_eq!(spec.text_overlays.len(), 1);
        let audio = spec.audio.unwrap();
        assert_eq!(audio.path, PathBuf::from("/srv/uploads/song.mp3"));
        assert_eq!(audio.mode, AudioMode::Mix);
    }

    #[test]
    fn test_process_request_defaults() {
        let layout = MediaLayout::new("/srv/uploads", "/srv/processed");
        let request: ProcessRequest =
            serde_json::from_value(serde_json::json!({"inputFile": "a.mp4"})).unwrap();

        let spec = request.into_spec(&layout).unwrap();
        assert!(spec.output_name.starts_with("processed_"));
        assert!(spec.output_name.ends_with(".mp4"));
        assert!(spec.audio.is_none());
    }

    #[test]
    fn test_process_request_rejects_traversal() {
        let layout = MediaLayout::new("/srv/uploads", "/srv/processed");
        let request: ProcessRequest =
            serde_json::from_value(serde_json::json!({"inputFile": "../etc/passwd"})).unwrap();
        assert!(matches!(
            request.into_spec(&layout),
            Err(ApiError::BadRequest(_))
        ));
    }
}
