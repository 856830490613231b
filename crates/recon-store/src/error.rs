//! Error types for the recon-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during node storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record under this key
    #[error("node not found: key {}", hex::encode(.0))]
    NotFound(Vec<u8>),

    /// The key index was not established before use
    #[error("key index not ready: call ensure_key_index first")]
    IndexNotReady,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<serde_ipld_dagcbor::DecodeError<std::convert::Infallible>> for StoreError {
    fn from(err: serde_ipld_dagcbor::DecodeError<std::convert::Infallible>) -> Self {
        StoreError::Deserialization(err.to_string())
    }
}
