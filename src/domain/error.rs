//! Domain error types

use thiserror::Error;

use crate::domain::model::ModelStatus;
use crate::domain::recording::RecordingState;

/// Error when parsing a clip length string
#[derive(Debug, Clone, Error)]
#[error("Invalid duration format: \"{input}\". Expected format: <number>s, <number>m, or <number>m<number>s (e.g., 30s, 1m, 2m30s)")]
pub struct ClipLengthParseError {
    pub input: String,
}

/// Error when a video mime type string cannot be parsed
#[derive(Debug, Clone, Error)]
#[error("Invalid video mime type: \"{input}\". Expected video/<container>[;codecs=<list>]")]
pub struct MimeTypeParseError {
    pub input: String,
}

/// Error when a recording session transition is not allowed
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidRecordingTransition {
    pub current_state: RecordingState,
    pub action: &'static str,
}

/// Error when the model state is asked to leave a terminal state
#[derive(Debug, Clone, Error)]
#[error("Model state is already {current}")]
pub struct ModelAlreadySettled {
    pub current: ModelStatus,
}

/// Finalization produced zero bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("No video data was recorded")]
pub struct EmptyRecording;

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
