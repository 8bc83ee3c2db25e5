//! Blob store port interface

use std::sync::Arc;

use thiserror::Error;

use crate::domain::recording::{BlobUrl, VideoMimeType};

/// Blob store errors
#[derive(Debug, Clone, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(BlobUrl),
}

/// Port for holding finished recording payloads in memory.
pub trait BlobStore: Send + Sync {
    /// Store a payload and hand back a URL referring to it
    fn create(&self, bytes: Vec<u8>, mime_type: &VideoMimeType) -> BlobUrl;

    fn read(&self, url: &BlobUrl) -> Result<Arc<[u8]>, BlobError>;

    /// Release a payload. Returns false when it was already released.
    fn revoke(&self, url: &BlobUrl) -> bool;
}
