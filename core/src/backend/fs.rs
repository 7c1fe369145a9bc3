use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub len: u64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("io error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("invalid pattern `{0}`")]
    Pattern(String),
}

impl FsError {
    pub fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Storage primitives. Callers only pass paths that went through the path guard.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> Result<String, FsError>;

    /// Write `contents`, creating parent directories as needed.
    async fn write(&self, path: &Path, contents: &str) -> Result<(), FsError>;

    /// Entry names of a directory, sorted. Directories carry a trailing `/`.
    async fn list(&self, dir: &Path) -> Result<Vec<String>, FsError>;

    async fn stat(&self, path: &Path) -> Result<FileStat, FsError>;

    /// Expand a glob pattern into matching paths, sorted.
    async fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, FsError>;
}
