//! Filesystem layout for uploaded and processed media.
//!
//! Every client-supplied name passes through [`is_safe_file_name`] before it
//! is joined to a directory, so a request can never address a path outside
//! the uploads or processed directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use innova_models::{FileKind, StoredFile};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// The two media directories.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    upload_dir: PathBuf,
    processed_dir: PathBuf,
}

impl MediaLayout {
    pub fn new(upload_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    /// Create both directories if missing.
    pub async fn ensure_dirs(&self) -> MediaResult<()> {
        fs::create_dir_all(&self.upload_dir).await?;
        fs::create_dir_all(&self.processed_dir).await?;
        Ok(())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn dir(&self, kind: FileKind) -> &Path {
        match kind {
            FileKind::Uploaded => &self.upload_dir,
            FileKind::Processed => &self.processed_dir,
        }
    }

    /// Path of an uploaded file. Rejects names that are not a single component.
    pub fn upload_path(&self, name: &str) -> MediaResult<PathBuf> {
        self.path_in(FileKind::Uploaded, name)
    }

    /// Path of a processed file. Rejects names that are not a single component.
    pub fn processed_path(&self, name: &str) -> MediaResult<PathBuf> {
        self.path_in(FileKind::Processed, name)
    }

    pub fn path_in(&self, kind: FileKind, name: &str) -> MediaResult<PathBuf> {
        if !is_safe_file_name(name) {
            return Err(MediaError::InvalidFileName(name.to_string()));
        }
        Ok(self.dir(kind).join(name))
    }

    /// Regular files in one directory, sorted by name. A missing directory
    /// lists as empty.
    pub async fn list(&self, kind: FileKind) -> MediaResult<Vec<StoredFile>> {
        let mut entries = match fs::read_dir(self.dir(kind)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            files.push(StoredFile {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
                size: metadata.len(),
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Delete `name` from both directories. Returns whether anything was removed.
    pub async fn delete_everywhere(&self, name: &str) -> MediaResult<bool> {
        let mut removed = false;
        for kind in [FileKind::Uploaded, FileKind::Processed] {
            let path = self.path_in(kind, name)?;
            removed |= remove_if_exists(&path).await?;
        }
        debug!(name, removed, "Delete requested");
        Ok(removed)
    }
}

/// A plain file name: one path component, no traversal, no option lookalikes.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
        && !name.starts_with('-')
}

/// Generate a collision-resistant file name: `<prefix>-<unix-ms>-<random>.<ext>`.
pub fn unique_file_name(prefix: &str, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().simple().to_string();
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        format!("{}-{}-{}", prefix, millis, &random[..9])
    } else {
        format!("{}-{}-{}.{}", prefix, millis, &random[..9], extension)
    }
}

/// Remove a file if present. Returns whether it existed.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> MediaLayout {
        MediaLayout::new(dir.path().join("uploads"), dir.path().join("processed"))
    }

    #[test]
    fn test_safe_names() {
        assert!(is_safe_file_name("video-1700000000000-123456789.mp4"));
        assert!(is_safe_file_name("processed_1700000000000_ab12cd34.mp4"));
        assert!(!is_safe_file_name(""));
        assert!(!is_safe_file_name(".."));
        assert!(!is_safe_file_name("../etc/passwd"));
        assert!(!is_safe_file_name("a/b.mp4"));
        assert!(!is_safe_file_name("a\\b.mp4"));
        assert!(!is_safe_file_name("-i.mp4"));
    }

    #[test]
    fn test_unique_names_differ() {
        let a = unique_file_name("video", ".mp4");
        let b = unique_file_name("video", "mp4");
        assert_ne!(a, b);
        assert!(a.starts_with("video-"));
        assert!(a.ends_with(".mp4"));
        assert!(is_safe_file_name(&a));
    }

    #[tokio::test]
    async fn test_paths_reject_traversal() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        assert!(matches!(
            layout.upload_path("../secret"),
            Err(MediaError::InvalidFileName(_))
        ));
        assert_eq!(
            layout.processed_path("out.mp4").unwrap(),
            dir.path().join("processed").join("out.mp4")
        );
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);

        // Missing directories list as empty.
        assert!(layout.list(FileKind::Uploaded).await.unwrap().is_empty());

        layout.ensure_dirs().await.unwrap();
        fs::write(layout.upload_path("b.mp4").unwrap(), b"12345")
            .await
            .unwrap();
        fs::write(layout.upload_path("a.mp4").unwrap(), b"1").await.unwrap();
        fs::write(layout.processed_path("b.mp4").unwrap(), b"123")
            .await
            .unwrap();

        let uploads = layout.list(FileKind::Uploaded).await.unwrap();
        let names: Vec<&str> = uploads.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4"]);
        assert_eq!(uploads[1].size, 5);

        assert!(layout.delete_everywhere("b.mp4").await.unwrap());
        assert!(!layout.delete_everywhere("b.mp4").await.unwrap());
        assert!(layout.list(FileKind::Processed).await.unwrap().is_empty());
        assert_eq!(layout.list(FileKind::Uploaded).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tmp.mp4");
        assert!(!remove_if_exists(&path).await.unwrap());
        fs::write(&path, b"x").await.unwrap();
        assert!(remove_if_exists(&path).await.unwrap());
    }
}
