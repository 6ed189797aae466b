use thiserror::Error;

use crate::domain::services::controller::ControllerPhase;
use crate::infrastructure::api::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("API error: {0}")]
    ApiError(#[from] ApiError),

    #[error("Controller error: {0}")]
    ControllerError(#[from] ControllerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failures of a storage backend.
///
/// These never escape `KeyValueStore`: the store logs them and degrades to
/// a no-op, so callers only ever see `Option` values.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded for key {0}")]
    QuotaExceeded(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors returned by `ConversationController` operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A previous message has not resolved yet; input must stay disabled.
    #[error("A message is already being sent")]
    SendInFlight,

    #[error("Cannot {action} while the controller is {phase}")]
    Busy {
        action: &'static str,
        phase: ControllerPhase,
    },

    #[error("Message is empty")]
    EmptyMessage,

    #[error("There is no failed message to retry")]
    NothingToRetry,

    /// Surfaced send failure. The text stays recorded as pending so the UI
    /// can offer a retry.
    #[error("Failed to send message: {source}")]
    SendFailed {
        #[source]
        source: ApiError,
        pending_text: String,
    },
}

impl ControllerError {
    /// Whether the UI should show a retry affordance for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::SendFailed { .. })
    }

    /// Human readable message suitable for the widget's error banner.
    pub fn user_message(&self) -> String {
        match self {
            ControllerError::SendFailed { source, .. } => source.user_message(),
            other => other.to_string(),
        }
    }
}
