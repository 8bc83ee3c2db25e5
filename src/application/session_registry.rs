//! Session registry of finished recordings

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::domain::recording::{ArtifactId, VideoArtifact};

use super::ports::{BlobError, BlobStore};

/// Ordered list of the recordings made this session.
///
/// Append-only except for delete, which also releases the recording's blob.
pub struct SessionRegistry {
    artifacts: Mutex<Vec<VideoArtifact>>,
    blobs: Arc<dyn BlobStore>,
}

impl SessionRegistry {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            artifacts: Mutex::new(Vec::new()),
            blobs,
        }
    }

    pub fn append(&self, artifact: VideoArtifact) {
        debug!(id = %artifact.id(), "Artifact registered");
        self.lock().push(artifact);
    }

    /// Remove by id and release its blob. Unknown ids are ignored.
    pub fn remove(&self, id: ArtifactId) -> Option<VideoArtifact> {
        let removed = {
            let mut artifacts = self.lock();
            let index = artifacts.iter().position(|a| a.id() == id)?;
            artifacts.remove(index)
        };
        self.blobs.revoke(removed.blob_url());
        info!(id = %id, "Recording deleted");
        Some(removed)
    }

    /// Snapshot in creation order
    pub fn list(&self) -> Vec<VideoArtifact> {
        self.lock().clone()
    }

    pub fn get(&self, id: ArtifactId) -> Option<VideoArtifact> {
        self.lock().iter().find(|a| a.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Recorded bytes for an artifact
    pub fn payload(&self, artifact: &VideoArtifact) -> Result<Arc<[u8]>, BlobError> {
        self.blobs.read(artifact.blob_url())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<VideoArtifact>> {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::VideoMimeType;
    use crate::infrastructure::blob::MemoryBlobStore;
    use chrono::Local;

    fn registry() -> (SessionRegistry, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        (SessionRegistry::new(blobs.clone()), blobs)
    }

    fn artifact(blobs: &MemoryBlobStore, id: u64, bytes: &[u8]) -> VideoArtifact {
        let mime = VideoMimeType::webm();
        let url = blobs.create(bytes.to_vec(), &mime);
        VideoArtifact::new(ArtifactId::new(id), url, Local::now(), bytes.len(), 3, mime)
    }

    #[test]
    fn append_keeps_creation_order() {
        let (registry, blobs) = registry();
        registry.append(artifact(&blobs, 1, b"a"));
        registry.append(artifact(&blobs, 2, b"b"));
        registry.append(artifact(&blobs, 3, b"c"));

        let ids: Vec<u64> = registry.list().iter().map(|a| a.id().value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn remove_releases_blob_once() {
        let (registry, blobs) = registry();
        let first = artifact(&blobs, 1, b"abc");
        let url = first.blob_url().clone();
        registry.append(first);

        assert!(registry.remove(ArtifactId::new(1)).is_some());
        assert!(registry.is_empty());
        assert!(blobs.read(&url).is_err());
        assert_eq!(blobs.revocations(), 1);

        // second delete is a no-op
        assert!(registry.remove(ArtifactId::new(1)).is_none());
        assert_eq!(blobs.revocations(), 1);
    }

    #[test]
    fn remove_unknown_id_keeps_others() {
        let (registry, blobs) = registry();
        registry.append(artifact(&blobs, 1, b"abc"));
        assert!(registry.remove(ArtifactId::new(42)).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(blobs.revocations(), 0);
    }

    #[test]
    fn payload_reads_blob() {
        let (registry, blobs) = registry();
        let a = artifact(&blobs, 7, b"video-bytes");
        registry.append(a.clone());
        assert_eq!(&*registry.payload(&a).unwrap(), b"video-bytes");
        assert_eq!(registry.get(ArtifactId::new(7)), Some(a));
    }

    #[test]
    fn list_is_a_snapshot() {
        let (registry, blobs) = registry();
        registry.append(artifact(&blobs, 1, b"a"));
        let snapshot = registry.list();
        registry.append(artifact(&blobs, 2, b"b"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }
}
