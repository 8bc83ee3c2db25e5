//! Model source port interface

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::model::{LoadedSubModel, ManifestError, SubModel, WeightManifest};

/// Model source errors
#[derive(Debug, Clone, Error)]
pub enum ModelSourceError {
    #[error("Failed to fetch {path}: {message}")]
    Fetch { path: String, message: String },

    #[error("Invalid weights for {model}: {source}")]
    Invalid {
        model: SubModel,
        #[source]
        source: ManifestError,
    },
}

/// Port for a place detector weights can be loaded from.
///
/// Adapters only provide raw file access; manifest parsing and shard
/// validation are shared by every source.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Human-readable location, e.g. a directory or base URL
    fn location(&self) -> &str;

    /// Read one file relative to the source root
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ModelSourceError>;

    /// Load a sub-model: manifest first, then every shard in order.
    async fn load(&self, model: SubModel) -> Result<LoadedSubModel, ModelSourceError> {
        let manifest_path = model.manifest_file();
        let raw = self.fetch(&manifest_path).await?;
        let text = String::from_utf8(raw).map_err(|e| ModelSourceError::Fetch {
            path: manifest_path.clone(),
            message: format!("manifest is not UTF-8: {}", e),
        })?;
        let manifest = WeightManifest::parse(&text)
            .map_err(|source| ModelSourceError::Invalid { model, source })?;

        let mut weights = Vec::new();
        for shard in manifest.shard_paths() {
            weights.extend(self.fetch(shard).await?);
        }
        manifest
            .validate(&weights)
            .map_err(|source| ModelSourceError::Invalid { model, source })?;

        Ok(LoadedSubModel {
            kind: model,
            manifest,
            weights,
        })
    }
}
