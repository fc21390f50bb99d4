use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors answering a drive read. Kept separate from `GatewayError` since
/// this crate has no core-crate dependency — the HTTP adapter translates
/// these into responses directly.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("not found")]
    NotFound,
    #[error("path escapes archive root")]
    PathTraversal,
    #[error("io error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for DriveError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => DriveError::NotFound,
            _ => DriveError::Io(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriveStat {
    pub is_directory: bool,
    pub size: u64,
}

/// A materialized, read-only view of an archive's filesystem.
///
/// This is the narrow "materialized drive" interface spec.md §3 describes:
/// `read_file`, `stat`, and directory listings against the root the swarm
/// adapter materialized for a key.
pub struct FsDrive {
    root: PathBuf,
}

impl FsDrive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>, DriveError> {
        let resolved = self.resolve(path)?;
        Ok(tokio::fs::read(resolved).await?)
    }

    pub async fn stat(&self, path: &str) -> Result<DriveStat, DriveError> {
        let resolved = self.resolve(path)?;
        let meta = tokio::fs::metadata(resolved).await?;
        Ok(DriveStat {
            is_directory: meta.is_dir(),
            size: meta.len(),
        })
    }

    pub async fn read_dir(&self, path: &str) -> Result<Vec<String>, DriveError> {
        let resolved = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(resolved).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a request subpath against the drive root, rejecting any
    /// path that would escape it via `..` components.
    fn resolve(&self, path: &str) -> Result<PathBuf, DriveError> {
        let trimmed = path.trim_start_matches('/');
        let rel = Path::new(if trimmed.is_empty() { "." } else { trimmed });
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(DriveError::PathTraversal);
        }
        Ok(self.root.join(rel))
    }
}
