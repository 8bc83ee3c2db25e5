//! Clip length value object and clock formatting

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::error::ClipLengthParseError;

/// Default clip length for headless runs (10 seconds)
pub const DEFAULT_CLIP_SECS: u64 = 10;

/// How long a headless run records before stopping on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClipLength {
    seconds: u64,
}

impl ClipLength {
    pub const fn from_secs(seconds: u64) -> Self {
        Self { seconds }
    }

    pub const fn as_secs(&self) -> u64 {
        self.seconds
    }

    pub const fn as_std(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl Default for ClipLength {
    fn default() -> Self {
        Self::from_secs(DEFAULT_CLIP_SECS)
    }
}

impl FromStr for ClipLength {
    type Err = ClipLengthParseError;

    /// Accepts `30s`, `2m`, `2m30s`, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ClipLengthParseError {
            input: s.to_string(),
        };
        let input = s.trim().to_lowercase();

        let (minutes, rest) = match input.split_once('m') {
            Some((m, rest)) => (Some(m), rest),
            None => (None, input.as_str()),
        };
        let seconds = if rest.is_empty() {
            None
        } else {
            Some(rest.strip_suffix('s').ok_or_else(err)?)
        };

        let number = |digits: &str| -> Result<u64, ClipLengthParseError> {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            digits.parse().map_err(|_| err())
        };

        let minutes = minutes.map(number).transpose()?;
        let seconds = seconds.map(number).transpose()?;
        if minutes.is_none() && seconds.is_none() {
            return Err(err());
        }

        let total = minutes.unwrap_or(0) * 60 + seconds.unwrap_or(0);
        if total == 0 {
            return Err(err());
        }
        Ok(Self::from_secs(total))
    }
}

impl fmt::Display for ClipLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.seconds / 60;
        let seconds = self.seconds % 60;
        match (minutes, seconds) {
            (0, s) => write!(f, "{}s", s),
            (m, 0) => write!(f, "{}m", m),
            (m, s) => write!(f, "{}m{}s", m, s),
        }
    }
}

/// Recording timer text, `mm:ss`
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Artifact duration text, `m:ss`
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
