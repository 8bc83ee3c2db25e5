//! Model load state machine

use std::fmt;

use crate::domain::error::ModelAlreadySettled;

/// Model readiness
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelStatus {
    #[default]
    NotLoaded,
    Loaded {
        source: String,
    },
    Failed(String),
}

impl ModelStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::NotLoaded)
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => write!(f, "loading"),
            Self::Loaded { source } => write!(f, "loaded from {}", source),
            Self::Failed(cause) => write!(f, "failed ({})", cause),
        }
    }
}

/// Model state.
/// Settles exactly once and never reverts:
///   NOT_LOADED -> LOADED (mark_loaded)
///   NOT_LOADED -> FAILED (mark_failed)
#[derive(Debug, Default)]
pub struct ModelState {
    status: ModelStatus,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &ModelStatus {
        &self.status
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, ModelStatus::Loaded { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ModelStatus::Failed(cause) => Some(cause),
            _ => None,
        }
    }

    pub fn mark_loaded(&mut self, source: impl Into<String>) -> Result<(), ModelAlreadySettled> {
        self.settle(ModelStatus::Loaded {
            source: source.into(),
        })
    }

    pub fn mark_failed(&mut self, cause: impl Into<String>) -> Result<(), ModelAlreadySettled> {
        self.settle(ModelStatus::Failed(cause.into()))
    }

    fn settle(&mut self, next: ModelStatus) -> Result<(), ModelAlreadySettled> {
        if self.status.is_settled() {
            return Err(ModelAlreadySettled {
                current: self.status.clone(),
            });
        }
        self.status = next;
        Ok(())
    }
}
