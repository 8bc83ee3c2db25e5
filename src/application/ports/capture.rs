//! Camera capture port interfaces

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::capture::{CaptureConstraints, Frame};

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device found")]
    NoDevice,

    #[error("Camera cannot satisfy the requested constraints: {0}")]
    ConstraintsUnsatisfiable(String),

    #[error("Camera stream failed: {0}")]
    StreamFailed(String),

    #[error("FFmpeg not found. Please install FFmpeg.")]
    FfmpegNotFound,
}

/// A live camera stream.
///
/// Frames are published through a watch channel holding the most recent
/// frame, so slow readers only ever see the latest one.
#[async_trait]
pub trait MediaStream: Send + Sync {
    /// Stable identifier for logs
    fn id(&self) -> &str;

    /// Constraints the stream was opened with
    fn constraints(&self) -> &CaptureConstraints;

    /// Subscribe to frame updates. `None` until the first frame arrives.
    fn frames(&self) -> watch::Receiver<Option<Frame>>;

    /// Most recent frame, if any
    fn latest_frame(&self) -> Option<Frame> {
        self.frames().borrow().clone()
    }

    /// Resolves once media is flowing, i.e. the first frame was delivered.
    async fn playing(&self) -> Result<(), CaptureError> {
        let mut frames = self.frames();
        let delivered = frames.wait_for(Option::is_some).await.is_ok();
        if delivered {
            Ok(())
        } else {
            Err(CaptureError::StreamFailed(
                "stream ended before the first frame".to_string(),
            ))
        }
    }

    /// False once the stream was stopped or its source went away
    fn is_live(&self) -> bool;

    /// Stop every track. Calling it again does nothing.
    fn stop_tracks(&self);
}

/// Port for acquiring camera streams
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the device for a stream matching the constraints as closely as it can.
    async fn request_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError>;

    /// Release a stream obtained from this device
    fn stop_stream(&self, stream: &dyn MediaStream) {
        stream.stop_tracks();
    }
}
