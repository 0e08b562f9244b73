use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::ports::file_system::{FileSystem, FileSystemError, FileSystemResult};

/// File system adapter backed by `tokio::fs`.
///
/// Writes go to a hidden temporary file in the destination directory which is synced and
/// then renamed over the destination, so a concurrent reader (the proxy's syntax check, a
/// reload) never observes a half-written site file or key.
#[derive(Debug, Default, Clone)]
pub struct FileSystemAdapter;

impl FileSystemAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn write_with_mode(
        &self,
        path: &Path,
        contents: &[u8],
        mode: Option<u32>,
    ) -> FileSystemResult<()> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| FileSystemError::InvalidPath(path.display().to_string()))?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };

        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| FileSystemError::io(&parent, e))?;

        let tmp_path = parent.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = async {
            let mut options = tokio::fs::OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            if let Some(mode) = mode {
                options.mode(mode);
            }
            #[cfg(not(unix))]
            let _ = mode;

            let mut file = options
                .open(&tmp_path)
                .await
                .map_err(|e| FileSystemError::io(&tmp_path, e))?;
            file.write_all(contents)
                .await
                .map_err(|e| FileSystemError::io(&tmp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| FileSystemError::io(&tmp_path, e))?;
            drop(file);

            tokio::fs::rename(&tmp_path, path)
                .await
                .map_err(|e| FileSystemError::io(path, e))
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result
    }
}

#[async_trait]
impl FileSystem for FileSystemAdapter {
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> FileSystemResult<()> {
        self.write_with_mode(path, contents, None).await
    }

    async fn write_private(&self, path: &Path, contents: &[u8]) -> FileSystemResult<()> {
        self.write_with_mode(path, contents, Some(0o600)).await
    }

    async fn link(&self, target: &Path, link: &Path) -> FileSystemResult<()> {
        if let Some(parent) = link.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FileSystemError::io(parent, e))?;
        }

        // symlink() refuses to overwrite, so clear out a stale link first
        self.remove(link).await?;

        #[cfg(unix)]
        {
            tokio::fs::symlink(target, link)
                .await
                .map_err(|e| FileSystemError::io(link, e))
        }
        #[cfg(not(unix))]
        {
            tokio::fs::copy(target, link)
                .await
                .map(|_| ())
                .map_err(|e| FileSystemError::io(link, e))
        }
    }

    async fn remove(&self, path: &Path) -> FileSystemResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FileSystemError::io(path, e)),
        }
    }

    async fn read(&self, path: &Path) -> FileSystemResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| FileSystemError::io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::symlink_metadata(path).await.is_ok()
    }

    async fn create_dir_all(&self, path: &Path) -> FileSystemResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| FileSystemError::io(path, e))
    }
}
