//! Weights manifest format.
//!
//! A manifest is a JSON array of groups. Each group lists the shard files that
//! hold its weights and describes every tensor stored in them, in order.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    #[error("Failed to parse weights manifest: {0}")]
    Parse(String),

    #[error("Unsupported dtype '{dtype}' for weight '{name}'")]
    UnsupportedDtype { name: String, dtype: String },

    #[error("Weight size mismatch: manifest describes {expected} bytes, shards hold {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Manifest lists no weight shards")]
    NoShards,

    #[error("Weight '{name}' describes more bytes than can be addressed")]
    TooLarge { name: String },
}

/// Quantized storage for a tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantization {
    pub dtype: String,
    #[serde(default)]
    pub scale: Option<f64>,
    #[serde(default)]
    pub min: Option<f64>,
}

/// One tensor described by the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
}

impl WeightEntry {
    /// Stored bytes for this tensor
    pub fn byte_len(&self) -> Result<usize, ManifestError> {
        let stored = self
            .quantization
            .as_ref()
            .map(|q| q.dtype.as_str())
            .unwrap_or(self.dtype.as_str());

        let width = match stored {
            "float32" | "int32" => 4,
            "uint16" | "float16" => 2,
            "uint8" | "bool" => 1,
            other => {
                return Err(ManifestError::UnsupportedDtype {
                    name: self.name.clone(),
                    dtype: other.to_string(),
                })
            }
        };

        let too_large = || ManifestError::TooLarge {
            name: self.name.clone(),
        };
        self.shape
            .iter()
            .try_fold(width, |acc: usize, dim| acc.checked_mul(*dim))
            .ok_or_else(too_large)
    }
}

/// Shards plus the tensors they hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightGroup {
    pub paths: Vec<String>,
    pub weights: Vec<WeightEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightManifest(pub Vec<WeightGroup>);

impl WeightManifest {
    pub fn parse(json: &str) -> Result<Self, ManifestError> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| ManifestError::Parse(e.to_string()))?;
        if manifest.shard_paths().next().is_none() {
            return Err(ManifestError::NoShards);
        }
        Ok(manifest)
    }

    /// Shard paths in load order
    pub fn shard_paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().flat_map(|g| g.paths.iter().map(String::as_str))
    }

    /// Total bytes the shards must contain
    pub fn expected_bytes(&self) -> Result<usize, ManifestError> {
        self.0
            .iter()
            .flat_map(|g| g.weights.iter())
            .try_fold(0usize, |acc, w| {
                acc.checked_add(w.byte_len()?)
                    .ok_or_else(|| ManifestError::TooLarge {
                        name: w.name.clone(),
                    })
            })
    }

    /// Reject shard data that does not match the manifest exactly
    pub fn validate(&self, weights: &[u8]) -> Result<(), ManifestError> {
        let expected = self.expected_bytes()?;
        if expected != weights.len() {
            return Err(ManifestError::SizeMismatch {
                expected,
                actual: weights.len(),
            });
        }
        Ok(())
    }
}
