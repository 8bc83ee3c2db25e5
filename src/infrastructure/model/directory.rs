//! Local model directory source

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::ports::{ModelSource, ModelSourceError};

/// Loads weights from a directory on disk, the primary source.
pub struct DirectoryModelSource {
    root: PathBuf,
    location: String,
}

impl DirectoryModelSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let location = root.display().to_string();
        Self { root, location }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ModelSource for DirectoryModelSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ModelSourceError> {
        let full = self.root.join(path);
        debug!(path = %full.display(), "Reading model file");
        fs::read(&full).await.map_err(|e| ModelSourceError::Fetch {
            path: full.display().to_string(),
            message: e.to_string(),
        })
    }
}
