//! Domain layer - Core business logic
//!
//! Contains value objects, entities, state machines, and domain errors.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod model;
pub mod recording;

// Re-export common types
pub use capture::{CameraStatus, CaptureConstraints, Frame};
pub use config::AppConfig;
pub use detection::{BoundingBox, DetectionResult, DetectionSet, Point};
pub use error::*;
pub use model::{ModelBundle, ModelState, ModelStatus, SubModel};
pub use recording::{
    ArtifactId, BlobUrl, ClipLength, RecordingSession, RecordingState, VideoArtifact,
    VideoMimeType,
};
