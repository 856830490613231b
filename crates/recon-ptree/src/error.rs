//! Error types for the recon-ptree crate

use recon_store::StoreError;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in prefix tree operations
///
/// Variants are split into fatal faults (data corruption or programming
/// errors, see [`CoreError::is_fatal`]) and recoverable conditions the caller
/// may act on.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Arithmetic between values of different fields
    #[error("finite field mismatch between Z({expected}) and Z({actual})")]
    FieldMismatch { expected: String, actual: String },

    /// Node not found
    #[error("node not found: {0}")]
    NotFound(String),

    /// Stored record failed to decode
    #[error("malformed node record: {0}")]
    MalformedRecord(String),

    /// Tree corruption detected
    #[error("tree corruption: {0}")]
    TreeCorruption(String),

    /// Operation not supported
    #[error("operation not supported: {0}")]
    UnsupportedOperation(String),

    /// Child navigation attempted on a leaf
    #[error("node {0} is a leaf and has no children")]
    NotInternal(String),

    /// Invalid tree configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Node store error
    #[error("node store error: {0}")]
    Store(#[source] StoreError),
}

impl CoreError {
    /// Whether the error indicates corruption or a programming error rather
    /// than a condition the caller can recover from
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::FieldMismatch { .. }
                | CoreError::MalformedRecord(_)
                | CoreError::TreeCorruption(_)
        )
    }

    /// Whether the error only reports an absent node
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => CoreError::NotFound(hex::encode(key)),
            StoreError::Deserialization(msg) => CoreError::MalformedRecord(msg),
            other => CoreError::Store(other),
        }
    }
}
