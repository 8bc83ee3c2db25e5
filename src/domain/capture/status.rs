//! Camera readiness

use std::fmt;

/// Camera readiness as seen by the rest of the studio.
///
/// Readiness takes two confirmations: the device grants a stream, then media
/// actually starts flowing. Only `Ready` is safe to detect against or record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CameraStatus {
    #[default]
    Initializing,
    /// Stream granted, no frame delivered yet
    Granted,
    Ready,
    Failed(String),
    Released,
}

impl CameraStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing | Self::Granted => write!(f, "Initializing..."),
            Self::Ready => write!(f, "Ready"),
            Self::Failed(message) => write!(f, "Failed ({})", message),
            Self::Released => write!(f, "Released"),
        }
    }
}
