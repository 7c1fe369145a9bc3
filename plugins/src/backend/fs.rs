use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use hive_core::api::{FileStat, Filesystem, FsError};

/// Host filesystem through `tokio::fs`. Path policy is enforced upstream.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, err: std::io::Error) -> FsError {
    if err.kind() == ErrorKind::NotFound {
        FsError::NotFound(path.to_path_buf())
    } else {
        FsError::io(path, err)
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn read_to_string(&self, path: &Path) -> Result<String, FsError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn write(&self, path: &Path, contents: &str) -> Result<(), FsError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn list(&self, dir: &Path) -> Result<Vec<String>, FsError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| io_error(dir, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, FsError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(FileStat {
            is_dir: meta.is_dir(),
            len: meta.len(),
        })
    }

    async fn glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, FsError> {
        let pattern = pattern.to_string_lossy().to_string();
        let matches = tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, FsError> {
            let paths = glob::glob(&pattern).map_err(|e| FsError::Pattern(e.to_string()))?;
            let mut found: Vec<PathBuf> = paths
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();
            found.sort();
            Ok(found)
        })
        .await
        .map_err(|e| FsError::Pattern(e.to_string()))??;
        Ok(matches)
    }
}
