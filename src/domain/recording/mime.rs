//! Video mime type value object

use std::fmt;
use std::str::FromStr;

use crate::domain::error::MimeTypeParseError;

/// Encodings to try, most preferred first
pub const DEFAULT_CANDIDATES: [&str; 4] = [
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
    "video/mp4;codecs=h264,aac",
];

/// A `video/<container>[;codecs=a,b]` mime type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoMimeType {
    container: String,
    codecs: Vec<String>,
}

impl VideoMimeType {
    /// Plain WebM with encoder-chosen codecs
    pub fn webm() -> Self {
        Self {
            container: "webm".to_string(),
            codecs: Vec::new(),
        }
    }

    /// Parsed [`DEFAULT_CANDIDATES`]
    pub fn default_candidates() -> Vec<Self> {
        DEFAULT_CANDIDATES
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    pub fn has_codec(&self, codec: &str) -> bool {
        self.codecs.iter().any(|c| c.eq_ignore_ascii_case(codec))
    }

    /// `mp4` when the type names mp4 anywhere, otherwise `webm`
    pub fn file_extension(&self) -> &'static str {
        if self.to_string().contains("mp4") {
            "mp4"
        } else {
            "webm"
        }
    }
}

impl FromStr for VideoMimeType {
    type Err = MimeTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MimeTypeParseError {
            input: s.to_string(),
        };

        let mut parts = s.trim().split(';');
        let essence = parts.next().unwrap_or_default().trim().to_lowercase();
        let container = essence
            .strip_prefix("video/")
            .filter(|c| !c.is_empty() && !c.contains('/'))
            .ok_or_else(err)?
            .to_string();

        let mut codecs = Vec::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                return Err(err());
            };
            if key.trim().eq_ignore_ascii_case("codecs") {
                codecs = value
                    .trim()
                    .trim_matches('"')
                    .split(',')
                    .map(|c| c.trim().to_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect();
            }
        }

        Ok(Self { container, codecs })
    }
}

impl fmt::Display for VideoMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "video/{}", self.container)?;
        if !self.codecs.is_empty() {
            write!(f, ";codecs={}", self.codecs.join(","))?;
        }
        Ok(())
    }
}
