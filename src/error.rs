//! Error types for the signal pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed parse error: {0}")]
    Feed(#[from] quick_xml::DeError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Insufficient data: need {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Coarse failure classes used when logging dropped items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or upstream service failure; retrying later may succeed.
    TransientExternal,
    /// Not enough market history to compute a snapshot.
    DataInsufficient,
    /// Collaborator output failed a guard (bad symbol, malformed reply).
    ValidationFailure,
    StorageUnavailable,
    Configuration,
}

impl BotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::Http(_) | BotError::Api(_) => ErrorKind::TransientExternal,
            BotError::Database(_) | BotError::StorageUnavailable(_) => {
                ErrorKind::StorageUnavailable
            }
            BotError::InsufficientData { .. } => ErrorKind::DataInsufficient,
            BotError::Json(_) | BotError::Feed(_) | BotError::Validation(_) => {
                ErrorKind::ValidationFailure
            }
            BotError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// True when the same call may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TransientExternal | ErrorKind::StorageUnavailable
        )
    }
}
