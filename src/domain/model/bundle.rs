//! Sub-models and the loaded model bundle

use std::fmt;

use super::manifest::WeightManifest;

/// A detector sub-model. Every required sub-model must load before the
/// detector counts as ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubModel {
    TinyFaceDetector,
    FaceLandmark68,
    FaceRecognition,
}

/// Sub-models loaded before detection can start, in load order
pub const REQUIRED_SUB_MODELS: [SubModel; 3] = [
    SubModel::TinyFaceDetector,
    SubModel::FaceLandmark68,
    SubModel::FaceRecognition,
];

impl SubModel {
    /// Weight file prefix used by model sources
    pub const fn file_stem(&self) -> &'static str {
        match self {
            Self::TinyFaceDetector => "tiny_face_detector_model",
            Self::FaceLandmark68 => "face_landmark_68_model",
            Self::FaceRecognition => "face_recognition_model",
        }
    }

    /// Manifest file name, e.g. `tiny_face_detector_model-weights_manifest.json`
    pub fn manifest_file(&self) -> String {
        format!("{}-weights_manifest.json", self.file_stem())
    }
}

impl fmt::Display for SubModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// One sub-model's manifest and concatenated weight shards.
#[derive(Debug, Clone)]
pub struct LoadedSubModel {
    pub kind: SubModel,
    pub manifest: WeightManifest,
    pub weights: Vec<u8>,
}

/// Every required sub-model, loaded from a single source.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    source: String,
    parts: Vec<LoadedSubModel>,
}

impl ModelBundle {
    pub fn new(source: impl Into<String>, parts: Vec<LoadedSubModel>) -> Self {
        Self {
            source: source.into(),
            parts,
        }
    }

    /// Where the bundle was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn get(&self, kind: SubModel) -> Option<&LoadedSubModel> {
        self.parts.iter().find(|p| p.kind == kind)
    }

    pub fn parts(&self) -> &[LoadedSubModel] {
        &self.parts
    }

    /// Total weight bytes across sub-models
    pub fn weight_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.weights.len()).sum()
    }

    /// True when every required sub-model is present
    pub fn is_complete(&self) -> bool {
        REQUIRED_SUB_MODELS.iter().all(|kind| self.get(*kind).is_some())
    }
}
