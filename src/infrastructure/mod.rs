//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like FFmpeg, the local filesystem,
//! HTTP model hosting and desktop notifications.

pub mod blob;
pub mod capture;
pub mod config;
pub mod detection;
pub mod download;
pub mod encoding;
pub mod model;
pub mod notification;

// Re-export adapters
pub use blob::MemoryBlobStore;
pub use capture::FfmpegCamera;
pub use config::XdgConfigStore;
pub use detection::NoOpDetector;
pub use download::DirectorySink;
pub use encoding::FfmpegEncoderFactory;
pub use model::{DirectoryModelSource, HttpModelSource};
pub use notification::{create_notifier, NotifyRustNotifier};
