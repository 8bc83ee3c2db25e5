//! Recording domain - session state machine, encodings and artifacts

mod artifact;
mod clip_length;
mod mime;
mod session;

pub use artifact::{
    download_file_name, ArtifactId, ArtifactIdGenerator, BlobUrl, VideoArtifact,
    CREATED_AT_FORMAT,
};
pub use clip_length::{format_clock, format_duration, ClipLength, DEFAULT_CLIP_SECS};
pub use mime::{VideoMimeType, DEFAULT_CANDIDATES};
pub use session::{FinishedRecording, RecordingSession, RecordingState};
