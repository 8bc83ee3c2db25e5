//! Model loader use case

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{watch, OnceCell};
use tracing::{error, info, warn};

use crate::domain::model::{ModelBundle, ModelState, ModelStatus, REQUIRED_SUB_MODELS};

use super::events::{EventBus, FailureKind, StudioEvent};
use super::ports::{ModelSource, ModelSourceError};

/// Both the primary and the fallback source failed
#[derive(Debug, Clone, Error)]
#[error("Failed to load face detection models. {primary_location}: {primary}; {fallback_location}: {fallback}")]
pub struct ModelLoadFailure {
    pub primary_location: String,
    pub primary: ModelSourceError,
    pub fallback_location: String,
    pub fallback: ModelSourceError,
}

/// Loads every required sub-model, primary source first, fallback once.
///
/// The first `load()` does the work; every later call returns the same
/// outcome without touching either source again.
pub struct ModelLoader {
    primary: Arc<dyn ModelSource>,
    fallback: Arc<dyn ModelSource>,
    outcome: OnceCell<Result<Arc<ModelBundle>, ModelLoadFailure>>,
    state: Mutex<ModelState>,
    status: watch::Sender<ModelStatus>,
    events: EventBus,
}

impl ModelLoader {
    pub fn new(
        primary: Arc<dyn ModelSource>,
        fallback: Arc<dyn ModelSource>,
        events: EventBus,
    ) -> Self {
        let (status, _) = watch::channel(ModelStatus::NotLoaded);
        Self {
            primary,
            fallback,
            outcome: OnceCell::new(),
            state: Mutex::new(ModelState::new()),
            status,
            events,
        }
    }

    pub fn status(&self) -> ModelStatus {
        self.status.borrow().clone()
    }

    /// The loaded bundle, once loading succeeded
    pub fn bundle(&self) -> Option<Arc<ModelBundle>> {
        self.outcome.get().and_then(|o| o.as_ref().ok()).cloned()
    }

    pub async fn load(&self) -> Result<Arc<ModelBundle>, ModelLoadFailure> {
        self.outcome
            .get_or_init(|| self.load_once())
            .await
            .clone()
    }

    async fn load_once(&self) -> Result<Arc<ModelBundle>, ModelLoadFailure> {
        let primary = match load_from(self.primary.as_ref()).await {
            Ok(bundle) => return Ok(self.settle_loaded(bundle)),
            Err(e) => e,
        };
        warn!(
            source = self.primary.location(),
            error = %primary,
            "Primary model source failed, trying fallback"
        );

        match load_from(self.fallback.as_ref()).await {
            Ok(bundle) => Ok(self.settle_loaded(bundle)),
            Err(fallback) => {
                let failure = ModelLoadFailure {
                    primary_location: self.primary.location().to_string(),
                    primary,
                    fallback_location: self.fallback.location().to_string(),
                    fallback,
                };
                error!(error = %failure, "Model loading failed");
                self.settle(|state| state.mark_failed(failure.to_string()));
                self.events.failure(FailureKind::ModelLoad, failure.to_string());
                Err(failure)
            }
        }
    }

    fn settle_loaded(&self, bundle: ModelBundle) -> Arc<ModelBundle> {
        info!(
            source = bundle.source(),
            bytes = bundle.weight_bytes(),
            "Face detection models loaded"
        );
        let source = bundle.source().to_string();
        self.settle(|state| state.mark_loaded(source));
        Arc::new(bundle)
    }

    fn settle<E>(&self, transition: impl FnOnce(&mut ModelState) -> Result<(), E>) {
        let status = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if transition(&mut state).is_err() {
                return;
            }
            state.status().clone()
        };
        self.status.send_replace(status.clone());
        self.events.publish(StudioEvent::ModelStatusChanged(status));
    }
}

/// Load every required sub-model from one source, all or nothing
async fn load_from(source: &dyn ModelSource) -> Result<ModelBundle, ModelSourceError> {
    let mut parts = Vec::with_capacity(REQUIRED_SUB_MODELS.len());
    for kind in REQUIRED_SUB_MODELS {
        parts.push(source.load(kind).await?);
    }
    Ok(ModelBundle::new(source.location(), parts))
}
