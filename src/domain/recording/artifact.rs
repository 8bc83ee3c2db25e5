//! Finished recording artifacts

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local, Utc};

use super::clip_length::format_duration;
use super::mime::VideoMimeType;

/// Format used for the human-readable creation stamp
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Unique artifact identifier, derived from the wall clock in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(u64);

impl ArtifactId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out ids that never repeat within the process, even when two
/// recordings finish within the same millisecond or the clock steps back.
#[derive(Debug, Default)]
pub struct ArtifactIdGenerator {
    last: AtomicU64,
}

impl ArtifactIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_millis: u64) -> ArtifactId {
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_millis.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return ArtifactId(candidate),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Opaque handle to recorded bytes held by a blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finished recording. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoArtifact {
    id: ArtifactId,
    blob_url: BlobUrl,
    created_at: String,
    size_bytes: usize,
    duration_seconds: u64,
    file_extension: &'static str,
    mime_type: VideoMimeType,
}

impl VideoArtifact {
    pub fn new(
        id: ArtifactId,
        blob_url: BlobUrl,
        created_at: DateTime<Local>,
        size_bytes: usize,
        duration_seconds: u64,
        mime_type: VideoMimeType,
    ) -> Self {
        Self {
            id,
            blob_url,
            created_at: created_at.format(CREATED_AT_FORMAT).to_string(),
            size_bytes,
            duration_seconds,
            file_extension: mime_type.file_extension(),
            mime_type,
        }
    }

    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn blob_url(&self) -> &BlobUrl {
        &self.blob_url
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn file_extension(&self) -> &'static str {
        self.file_extension
    }

    pub fn mime_type(&self) -> &VideoMimeType {
        &self.mime_type
    }

    /// Size in mebibytes with two decimals, e.g. `1.50 MB`
    pub fn human_readable_size(&self) -> String {
        format!("{:.2} MB", self.size_bytes as f64 / BYTES_PER_MB)
    }

    /// Duration as `m:ss`
    pub fn duration_label(&self) -> String {
        format_duration(self.duration_seconds)
    }
}

/// Download name: `face-tracking-<YYYY-MM-DDTHH-MM-SS>.<ext>`
pub fn download_file_name(extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "face-tracking-{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        extension
    )
}
