//! Capture constraints requested from the camera

use std::fmt;

/// Default ideal capture width
pub const DEFAULT_WIDTH: u32 = 1280;

/// Default ideal capture height
pub const DEFAULT_HEIGHT: u32 = 720;

/// Which camera to prefer on devices with several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

impl FacingMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Environment => "environment",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Desired stream properties. Resolution is an ideal, not a hard requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
    /// Request microphone audio alongside video
    pub audio: bool,
}

impl CaptureConstraints {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn without_audio(mut self) -> Self {
        self.audio = false;
        self
    }

    /// "1280x720"
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            facing_mode: FacingMode::User,
            audio: true,
        }
    }
}
