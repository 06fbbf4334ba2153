//! Evidence (photo) storage interface.

use async_trait::async_trait;

use crate::model::EvidenceRef;

/// Result type for evidence store operations.
pub type Result<T> = std::result::Result<T, EvidenceError>;

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("Evidence not found: {0}")]
    NotFound(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailed { expected: String, actual: String },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage for photo evidence.
///
/// The ledger stores the returned reference verbatim and never interprets it.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Store a blob and return a stable reference to it.
    ///
    /// `extension` is a file-name hint such as `"jpg"`.
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<EvidenceRef>;

    /// Retrieve a blob by reference.
    async fn get(&self, reference: &EvidenceRef) -> Result<Vec<u8>>;
}
