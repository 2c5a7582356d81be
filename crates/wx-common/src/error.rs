//! Error types for wx-explore services.

use thiserror::Error;

/// Result type alias using WxError.
pub type WxResult<T> = Result<T, WxError>;

/// Primary error type for catalog, storage and queue operations.
#[derive(Debug, Error)]
pub enum WxError {
    // === Lookup Errors ===
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // === Data Errors ===
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Queue error: {0}")]
    QueueError(String),

    // === Infrastructure Errors ===
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl WxError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            WxError::StorageError(_)
                | WxError::DatabaseError(_)
                | WxError::QueueError(_)
                | WxError::InternalError(_)
        )
    }
}

// Conversion from common error types
impl From<std::io::Error> for WxError {
    fn from(err: std::io::Error) -> Self {
        WxError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for WxError {
    fn from(err: serde_json::Error) -> Self {
        WxError::Serialization(format!("JSON error: {}", err))
    }
}
