//! Application configuration value object

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::capture::{CaptureConstraints, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Fallback weights host
pub const DEFAULT_MODEL_URL: &str =
    "https://cdn.jsdelivr.net/gh/justadudewhohacks/face-api.js@master/weights";
pub const DEFAULT_MODEL_DIR: &str = "./models";
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 100;
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_STOP_GRACE_MS: u64 = 200;
pub const DEFAULT_VIDEO_BITRATE: u64 = 2_500_000;

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: Option<String>,
    pub audio_device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub audio: Option<bool>,
    pub model_dir: Option<String>,
    pub model_url: Option<String>,
    pub detection_interval_ms: Option<u64>,
    pub chunk_interval_ms: Option<u64>,
    pub stop_grace_ms: Option<u64>,
    pub video_bitrate: Option<u64>,
    pub output_dir: Option<String>,
    pub notify: Option<bool>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            device: None,
            audio_device: None,
            width: Some(DEFAULT_WIDTH),
            height: Some(DEFAULT_HEIGHT),
            audio: Some(true),
            model_dir: Some(DEFAULT_MODEL_DIR.to_string()),
            model_url: Some(DEFAULT_MODEL_URL.to_string()),
            detection_interval_ms: Some(DEFAULT_DETECTION_INTERVAL_MS),
            chunk_interval_ms: Some(DEFAULT_CHUNK_INTERVAL_MS),
            stop_grace_ms: Some(DEFAULT_STOP_GRACE_MS),
            video_bitrate: Some(DEFAULT_VIDEO_BITRATE),
            output_dir: Some(".".to_string()),
            notify: Some(false),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    pub fn merge(self, other: Self) -> Self {
        Self {
            device: other.device.or(self.device),
            audio_device: other.audio_device.or(self.audio_device),
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            audio: other.audio.or(self.audio),
            model_dir: other.model_dir.or(self.model_dir),
            model_url: other.model_url.or(self.model_url),
            detection_interval_ms: other.detection_interval_ms.or(self.detection_interval_ms),
            chunk_interval_ms: other.chunk_interval_ms.or(self.chunk_interval_ms),
            stop_grace_ms: other.stop_grace_ms.or(self.stop_grace_ms),
            video_bitrate: other.video_bitrate.or(self.video_bitrate),
            output_dir: other.output_dir.or(self.output_dir),
            notify: other.notify.or(self.notify),
        }
    }

    /// Camera constraints from width/height/audio
    pub fn constraints(&self) -> CaptureConstraints {
        let constraints = CaptureConstraints::new(
            self.width.filter(|w| *w > 0).unwrap_or(DEFAULT_WIDTH),
            self.height.filter(|h| *h > 0).unwrap_or(DEFAULT_HEIGHT),
        );
        if self.audio.unwrap_or(true) {
            constraints
        } else {
            constraints.without_audio()
        }
    }

    pub fn model_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.model_dir.as_deref().unwrap_or(DEFAULT_MODEL_DIR))
    }

    pub fn model_url_or_default(&self) -> &str {
        self.model_url.as_deref().unwrap_or(DEFAULT_MODEL_URL)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(
            self.detection_interval_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_DETECTION_INTERVAL_MS),
        )
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(
            self.chunk_interval_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_CHUNK_INTERVAL_MS),
        )
    }

    /// Zero is allowed and means finalize immediately
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms.unwrap_or(DEFAULT_STOP_GRACE_MS))
    }

    pub fn video_bitrate_or_default(&self) -> u64 {
        self.video_bitrate
            .filter(|b| *b > 0)
            .unwrap_or(DEFAULT_VIDEO_BITRATE)
    }

    pub fn output_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.output_dir.as_deref().unwrap_or("."))
    }

    /// Get notify setting, or false if not set
    pub fn notify_or_default(&self) -> bool {
        self.notify.unwrap_or(false)
    }
}
