//! Error types for the ingestion crate.

use grib2_parser::Grib2Error;
use thiserror::Error;
use wx_common::WxError;

/// Errors that can occur during reduction or ingestion.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to decode GRIB2 data: {0}")]
    Grib2(#[from] Grib2Error),

    #[error("Storage error: {0}")]
    Storage(#[from] WxError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source {0} has no configured fields")]
    NoFields(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from a [`UrlFetcher`](crate::reduce::UrlFetcher).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// Connection problems, timeouts and server errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;
