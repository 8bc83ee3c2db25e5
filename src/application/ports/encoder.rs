//! Video encoder port interfaces

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::recording::VideoMimeType;

use super::capture::MediaStream;

/// Encoder errors
#[derive(Debug, Clone, Error)]
pub enum EncoderError {
    #[error("Unsupported encoding: {0}")]
    Unsupported(String),

    #[error("Failed to start encoder: {0}")]
    StartFailed(String),

    #[error("Failed to stop encoder: {0}")]
    StopFailed(String),

    #[error("FFmpeg not found. Please install FFmpeg.")]
    FfmpegNotFound,
}

/// Events an encoder reports while running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    Started,
    /// One slice of encoded output. May be empty.
    Chunk(Vec<u8>),
    Error(String),
    /// Output is complete; no further chunks follow
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub mime_type: VideoMimeType,
    pub video_bits_per_second: u64,
}

/// A single-use encoder bound to one stream
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Begin encoding, emitting a chunk roughly every `timeslice`
    async fn start(&self, timeslice: Duration) -> Result<(), EncoderError>;

    /// Ask the encoder to flush and finish. Completion is signalled by
    /// [`EncoderEvent::Stopped`].
    async fn request_stop(&self) -> Result<(), EncoderError>;
}

/// Port for creating encoders
#[async_trait]
pub trait EncoderFactory: Send + Sync {
    /// Whether this encoding can be produced right now
    async fn is_type_supported(&self, mime_type: &VideoMimeType) -> bool;

    fn create(
        &self,
        stream: Arc<dyn MediaStream>,
        options: EncoderOptions,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<Arc<dyn MediaEncoder>, EncoderError>;
}
