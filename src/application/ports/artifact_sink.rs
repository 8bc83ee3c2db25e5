//! Artifact sink port interface

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::ArtifactId;

use super::blob_store::BlobError;

/// Download errors
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    #[error("Recording {0} not found")]
    NotFound(ArtifactId),

    #[error("Recording data unavailable: {0}")]
    Blob(#[from] BlobError),

    #[error("Failed to save {path}: {message}")]
    WriteFailed { path: String, message: String },
}

/// Port for delivering a recording to the user
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Save bytes under the given file name, returning where they landed
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError>;
}
