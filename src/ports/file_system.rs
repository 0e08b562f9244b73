use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Error type for file system operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FileSystemError {
    /// Error when encountering an IO issue
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error when path is invalid
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl FileSystemError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for file system operations
pub type FileSystemResult<T> = Result<T, FileSystemError>;

/// FileSystem defines the port (interface) for the proxy site store and certificate store
#[async_trait]
pub trait FileSystem: Send + Sync + 'static {
    /// Replace `path` with `contents` so that readers see either the old or the new file,
    /// never a partial one. Parent directories are created as needed.
    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> FileSystemResult<()>;

    /// Like [`FileSystem::write_atomic`], but the file is readable by its owner only.
    async fn write_private(&self, path: &Path, contents: &[u8]) -> FileSystemResult<()>;

    /// Point `link` at `target`, replacing whatever `link` pointed at before.
    async fn link(&self, target: &Path, link: &Path) -> FileSystemResult<()>;

    /// Remove a file or link. A missing path is not an error.
    async fn remove(&self, path: &Path) -> FileSystemResult<()>;

    async fn read(&self, path: &Path) -> FileSystemResult<Vec<u8>>;

    async fn exists(&self, path: &Path) -> bool;

    async fn create_dir_all(&self, path: &Path) -> FileSystemResult<()>;
}
