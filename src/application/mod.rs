//! Application layer - Use cases and port interfaces
//!
//! Contains the studio's components and the trait definitions
//! for external system interactions.

pub mod capture_session;
pub mod detection_loop;
pub mod events;
pub mod model_loader;
pub mod ports;
pub mod recording;
pub mod session_registry;
pub mod studio;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export use cases
pub use capture_session::{CameraFailure, CaptureSession};
pub use detection_loop::{DetectionCycleError, DetectionLoop, DetectionStats};
pub use events::{EventBus, FailureKind, StudioEvent};
pub use model_loader::{ModelLoadFailure, ModelLoader};
pub use recording::{RecordingError, RecordingOptions, RecordingPipeline, RecordingStatus};
pub use session_registry::SessionRegistry;
pub use studio::{InitReport, Studio, StudioConfig, StudioPorts, StudioSnapshot};
