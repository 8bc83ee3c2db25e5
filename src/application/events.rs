//! Studio event broadcasting

use std::fmt;

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::capture::CameraStatus;
use crate::domain::model::ModelStatus;
use crate::domain::recording::{ArtifactId, VideoArtifact, VideoMimeType};

const EVENT_CAPACITY: usize = 64;

/// What went wrong, for routing and titles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Camera,
    ModelLoad,
    DetectionCycle,
    RecordingNotReady,
    Recording,
    EmptyRecording,
    NoSupportedFormat,
    Download,
}

impl FailureKind {
    /// Short title for notifications
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Camera => "Camera unavailable",
            Self::ModelLoad => "Face detection unavailable",
            Self::DetectionCycle => "Detection error",
            Self::RecordingNotReady => "Cannot record",
            Self::Recording => "Recording failed",
            Self::EmptyRecording => "Empty recording",
            Self::NoSupportedFormat => "No supported video format",
            Self::Download => "Download failed",
        }
    }

    /// True for faults that end the whole session rather than one action
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Camera | Self::ModelLoad)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Everything the studio reports to its observers
#[derive(Debug, Clone)]
pub enum StudioEvent {
    CameraStatusChanged(CameraStatus),
    ModelStatusChanged(ModelStatus),
    DetectionStarted,
    RecordingStarted { mime_type: VideoMimeType },
    RecordingStopped { elapsed_seconds: u64 },
    ArtifactCreated(VideoArtifact),
    ArtifactDeleted(ArtifactId),
    Failure { kind: FailureKind, message: String },
}

/// Cloneable handle for publishing studio events.
///
/// Publishing never blocks and never fails; events sent while nobody is
/// subscribed are dropped, and slow subscribers skip ahead.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: StudioEvent) {
        if self.sender.send(event).is_err() {
            debug!("No event subscribers");
        }
    }

    pub fn failure(&self, kind: FailureKind, message: impl Into<String>) {
        self.publish(StudioEvent::Failure {
            kind,
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
