//! Face detector port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::capture::Frame;
use crate::domain::detection::{BoundingBox, Point};
use crate::domain::model::ModelBundle;

/// Detector errors
#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    #[error("Frame rejected by detector: {0}")]
    InvalidFrame(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Raw detector output for one face: box plus 68 landmark points
pub type FaceDetection = (BoundingBox, Vec<Point>);

/// Port for face detection inference.
///
/// Implementations run against a loaded model bundle and report faces in the
/// frame's own pixel space, in the order they were found.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(
        &self,
        models: &ModelBundle,
        frame: &Frame,
    ) -> Result<Vec<FaceDetection>, DetectionError>;
}
