//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::recording::ClipLength;

/// Face Tracking Studio - live face tracking with session recording
#[derive(Parser, Debug)]
#[command(name = "face-tracking-studio")]
#[command(version)]
#[command(about = "Open the camera, track faces and record a clip")]
#[command(long_about = None)]
pub struct Cli {
    /// Recording length (e.g., 10s, 1m, 2m30s). Ctrl+C stops early.
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Directory recordings are saved into
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Camera device (e.g., /dev/video0 on Linux, 0 on macOS)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Local directory holding detector weights
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Base URL weights are fetched from when the local directory fails
    #[arg(long, value_name = "URL")]
    pub model_url: Option<String>,

    /// Record video only
    #[arg(long)]
    pub no_audio: bool,

    /// Show desktop notifications for failures
    #[arg(short = 'n', long)]
    pub notify: bool,

    /// Log debug output to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Config subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed options for one recording session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub duration: ClipLength,
    pub notify: bool,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "device",
    "audio_device",
    "width",
    "height",
    "audio",
    "model_dir",
    "model_url",
    "detection_interval_ms",
    "chunk_interval_ms",
    "stop_grace_ms",
    "video_bitrate",
    "output_dir",
    "notify",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
