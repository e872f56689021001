//! # Metadata Store Errors

use std::path::PathBuf;

use thiserror::Error;

/// Result type for metadata store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Metadata store errors
#[derive(Debug, Error)]
pub enum StoreError {
    // Configuration errors
    #[error("No store endpoints configured")]
    NoEndpoints,

    #[error("Invalid store endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    // Snapshot errors
    #[error("Store endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Store request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Snapshot version {requested} not available (store is at {current})")]
    VersionUnavailable { requested: i64, current: i64 },

    // I/O errors
    #[error("Failed to read store document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// True when the endpoint list itself is unusable
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            StoreError::NoEndpoints | StoreError::InvalidEndpoint { .. }
        )
    }
}
