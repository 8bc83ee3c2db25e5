//! In-memory blob store

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use crate::application::ports::{BlobError, BlobStore};
use crate::domain::recording::{BlobUrl, VideoMimeType};

const URL_PREFIX: &str = "blob:face-tracking-studio/";

/// Keeps recordings in process memory under `blob:` URLs.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<BlobUrl, Arc<[u8]>>>,
    revocations: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blobs
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total bytes held
    pub fn total_bytes(&self) -> usize {
        self.lock().values().map(|b| b.len()).sum()
    }

    /// How many blobs were actually released
    pub fn revocations(&self) -> usize {
        self.revocations.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlobUrl, Arc<[u8]>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryBlobStore {
    fn create(&self, bytes: Vec<u8>, mime_type: &VideoMimeType) -> BlobUrl {
        let url = BlobUrl::new(format!("{}{}", URL_PREFIX, Uuid::new_v4()));
        debug!(url = %url, bytes = bytes.len(), mime_type = %mime_type, "Blob created");
        self.lock().insert(url.clone(), bytes.into());
        url
    }

    fn read(&self, url: &BlobUrl) -> Result<Arc<[u8]>, BlobError> {
        self.lock()
            .get(url)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(url.clone()))
    }

    fn revoke(&self, url: &BlobUrl) -> bool {
        let removed = self.lock().remove(url).is_some();
        if removed {
            self.revocations.fetch_add(1, Ordering::SeqCst);
            debug!(url = %url, "Blob revoked");
        }
        removed
    }
}
