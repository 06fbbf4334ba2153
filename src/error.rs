//! Errors surfaced by ledger operations.

use crate::interfaces::{EvidenceError, StorageError};
use crate::model::{DamageReportId, FoundReportId, StudentId, TextbookId};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} is inactive")]
    Inactive { entity: &'static str, id: i64 },

    #[error("Textbook {textbook_id} is already issued to student {student_id}")]
    AlreadyIssued {
        textbook_id: TextbookId,
        student_id: StudentId,
    },

    #[error("Textbook {textbook_id} is not on loan")]
    NotIssued { textbook_id: TextbookId },

    #[error("Textbook {textbook_id} is not on loan to student {student_id}")]
    NotBorrower {
        textbook_id: TextbookId,
        student_id: StudentId,
    },

    #[error("Damage report {0} has already been checked")]
    AlreadyChecked(DamageReportId),

    #[error("Found report {0} has already been returned")]
    AlreadyReturned(FoundReportId),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Evidence error: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors caused by the request rather than by infrastructure.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Storage(_) | LedgerError::Evidence(_))
    }
}

/// Check that `value` holds between `min` and `max` characters after trimming.
pub(crate) fn check_length(field: &'static str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(LedgerError::Validation {
            field,
            reason: format!("must be {}..={} characters, got {}", min, max, len),
        });
    }
    Ok(())
}
