//! Saves downloaded recordings into a directory

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::application::ports::{ArtifactSink, DownloadError};

/// Writes recordings into a fixed directory.
///
/// A name that is already taken gets a `-1`, `-2`, ... suffix before the
/// extension, so downloads made within the same second never overwrite
/// each other.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn free_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }

        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (file_name, None),
        };
        let mut n = 1;
        loop {
            let name = match ext {
                Some(ext) => format!("{}-{}.{}", stem, n, ext),
                None => format!("{}-{}", stem, n),
            };
            let path = self.dir.join(name);
            if !fs::try_exists(&path).await.unwrap_or(false) {
                return path;
            }
            n += 1;
        }
    }
}

fn write_failed(path: &Path, error: std::io::Error) -> DownloadError {
    DownloadError::WriteFailed {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| write_failed(&self.dir, e))?;

        let path = self.free_path(file_name).await;
        fs::write(&path, bytes)
            .await
            .map_err(|e| write_failed(&path, e))?;
        Ok(path)
    }
}
