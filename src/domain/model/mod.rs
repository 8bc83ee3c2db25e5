//! Detector model value objects

mod bundle;
mod manifest;
mod state;

pub use bundle::{LoadedSubModel, ModelBundle, SubModel, REQUIRED_SUB_MODELS};
pub use manifest::{ManifestError, Quantization, WeightEntry, WeightGroup, WeightManifest};
pub use state::{ModelState, ModelStatus};
