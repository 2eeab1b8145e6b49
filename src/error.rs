//! Error types shared by the controller, storage and API layers

use thiserror::Error;

/// Message shown to the user when a routine cannot be added
pub const VALIDATION_MESSAGE: &str = "Enter a name and a duration of at least 1 minute.";

#[derive(Debug, Error)]
pub enum RoutineError {
    /// Input rejected at the add boundary; carries the user-facing message
    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to lock {0}")]
    Lock(String),
}

impl RoutineError {
    pub fn validation() -> Self {
        Self::Validation(VALIDATION_MESSAGE.to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, RoutineError>;
