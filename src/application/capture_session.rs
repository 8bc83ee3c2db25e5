//! Capture session use case

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::capture::{CameraStatus, CaptureConstraints, Frame};

use super::events::{EventBus, FailureKind, StudioEvent};
use super::ports::{CaptureDevice, CaptureError, MediaStream};

/// How long a granted stream may take to deliver its first frame
pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(10);

/// Camera could not be brought up
#[derive(Debug, Clone, Error)]
#[error("Camera unavailable: {0}")]
pub struct CameraFailure(#[from] pub CaptureError);

/// Owns the single live camera stream.
///
/// Readiness goes Initializing -> Granted -> Ready, or ends in Failed.
/// There is no automatic retry after a failure.
pub struct CaptureSession {
    device: Arc<dyn CaptureDevice>,
    stream: Mutex<Option<Arc<dyn MediaStream>>>,
    acquiring: tokio::sync::Mutex<()>,
    status: watch::Sender<CameraStatus>,
    first_frame_timeout: Duration,
    events: EventBus,
}

impl CaptureSession {
    pub fn new(device: Arc<dyn CaptureDevice>, events: EventBus) -> Self {
        let (status, _) = watch::channel(CameraStatus::Initializing);
        Self {
            device,
            stream: Mutex::new(None),
            acquiring: tokio::sync::Mutex::new(()),
            status,
            first_frame_timeout: FIRST_FRAME_TIMEOUT,
            events,
        }
    }

    pub fn with_first_frame_timeout(mut self, timeout: Duration) -> Self {
        self.first_frame_timeout = timeout;
        self
    }

    pub fn status(&self) -> CameraStatus {
        self.status.borrow().clone()
    }

    /// The live stream, if one is up and flowing
    pub fn ready_stream(&self) -> Option<Arc<dyn MediaStream>> {
        if !self.status.borrow().is_ready() {
            return None;
        }
        self.slot().as_ref().filter(|s| s.is_live()).cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.ready_stream().is_some()
    }

    /// Latest frame from the live stream
    pub fn latest_frame(&self) -> Option<Frame> {
        self.ready_stream().and_then(|s| s.latest_frame())
    }

    /// Open the camera, or hand back the stream that is already live.
    pub async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CameraFailure> {
        let _guard = self.acquiring.lock().await;

        let live = self.slot().as_ref().filter(|s| s.is_live()).cloned();
        if let Some(live) = live {
            return Ok(live);
        }

        info!(resolution = %constraints.resolution(), audio = constraints.audio, "Requesting camera");
        self.set_status(CameraStatus::Initializing);

        let stream = match self.device.request_stream(constraints).await {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e)),
        };
        self.set_status(CameraStatus::Granted);

        let playing = tokio::time::timeout(self.first_frame_timeout, stream.playing()).await;
        let playing = playing.unwrap_or_else(|_| {
            Err(CaptureError::StreamFailed(format!(
                "no frames within {}s",
                self.first_frame_timeout.as_secs()
            )))
        });
        if let Err(e) = playing {
            self.device.stop_stream(stream.as_ref());
            return Err(self.fail(e));
        }

        *self.slot() = Some(Arc::clone(&stream));
        self.set_status(CameraStatus::Ready);
        info!(stream = stream.id(), "Camera ready");
        Ok(stream)
    }

    /// Stop every track of the live stream. Safe to call repeatedly.
    pub fn release(&self) {
        let Some(stream) = self.slot().take() else {
            return;
        };
        self.device.stop_stream(stream.as_ref());
        self.set_status(CameraStatus::Released);
        info!(stream = stream.id(), "Camera released");
    }

    fn fail(&self, error: CaptureError) -> CameraFailure {
        warn!(error = %error, "Camera acquisition failed");
        self.set_status(CameraStatus::Failed(error.to_string()));
        self.events.failure(FailureKind::Camera, error.to_string());
        CameraFailure(error)
    }

    fn set_status(&self, status: CameraStatus) {
        self.status.send_replace(status.clone());
        self.events.publish(StudioEvent::CameraStatusChanged(status));
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn MediaStream>>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
