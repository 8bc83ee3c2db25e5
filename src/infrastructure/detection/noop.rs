//! Detector for running without an inference backend

use async_trait::async_trait;

use crate::application::ports::{DetectionError, FaceDetection, FaceDetector};
use crate::domain::capture::Frame;
use crate::domain::model::ModelBundle;

/// Reports no faces for every frame, after checking the frame is sane.
pub struct NoOpDetector;

impl NoOpDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceDetector for NoOpDetector {
    async fn detect(
        &self,
        _models: &ModelBundle,
        frame: &Frame,
    ) -> Result<Vec<FaceDetection>, DetectionError> {
        let expected = Frame::byte_len(frame.width(), frame.height());
        if frame.data().len() != expected {
            return Err(DetectionError::InvalidFrame(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                frame.width(),
                frame.height(),
                frame.data().len()
            )));
        }
        Ok(Vec::new())
    }
}
