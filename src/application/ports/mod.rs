//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod artifact_sink;
pub mod blob_store;
pub mod capture;
pub mod config;
pub mod detector;
pub mod encoder;
pub mod model_source;
pub mod notifier;

// Re-export common types
pub use artifact_sink::{ArtifactSink, DownloadError};
pub use blob_store::{BlobError, BlobStore};
pub use capture::{CaptureDevice, CaptureError, MediaStream};
pub use config::ConfigStore;
pub use detector::{DetectionError, FaceDetection, FaceDetector};
pub use encoder::{EncoderError, EncoderEvent, EncoderFactory, EncoderOptions, MediaEncoder};
pub use model_source::{ModelSource, ModelSourceError};
pub use notifier::{NotificationError, NotificationIcon, Notifier};
