//! Configuration value objects

mod app_config;

pub use app_config::{
    AppConfig, DEFAULT_CHUNK_INTERVAL_MS, DEFAULT_DETECTION_INTERVAL_MS, DEFAULT_MODEL_DIR,
    DEFAULT_MODEL_URL, DEFAULT_STOP_GRACE_MS, DEFAULT_VIDEO_BITRATE,
};
