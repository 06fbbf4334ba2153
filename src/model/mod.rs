//! Domain records of the textbook ledger.
//!
//! Rows are addressed by integer ids handed out by the record store.
//! Relationships are plain foreign keys; nothing here holds a pointer to
//! another record.

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum stored as text.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::model::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::model::UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod damage;
pub mod found;
pub mod loan;
pub mod student;
pub mod textbook;
pub mod user;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use damage::{
    DamageCategory, DamageDecision, DamageFilter, DamageReport, NewDamageReport, ReporterRole,
    ReviewStatus,
};
pub use found::{FoundFilter, FoundReport, FoundResolution, FoundStatus, NewFoundReport};
pub use loan::{
    IssueDraft, IssueOutcome, LoanEvent, LoanFilter, LoanKind, LoanStatus, ReturnDraft,
    ReturnOutcome,
};
pub use student::{NewStudent, Student};
pub use textbook::{NewTextbook, Textbook, TextbookFilter};
pub use user::{NewUser, User, UserRole};

pub type TextbookId = i64;
pub type StudentId = i64;
pub type UserId = i64;
pub type LoanEventId = i64;
pub type DamageReportId = i64;
pub type FoundReportId = i64;

/// Opaque reference to a stored piece of photo evidence.
///
/// Produced by an `EvidenceStore` and persisted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceRef(String);

impl EvidenceRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a one-shot state transition attempted against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    /// The record moved to its terminal state.
    Applied(T),
    /// The record was already terminal; returned unchanged.
    AlreadyFinal(T),
}

/// Error for status strings that do not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_enums_round_trip_through_strings() {
        assert_eq!("issue".parse::<LoanKind>().unwrap(), LoanKind::Issue);
        assert_eq!(LoanStatus::Cancelled.as_str(), "cancelled");
        assert_eq!(DamageCategory::Lost.to_string(), "lost");
        assert_eq!("returned".parse::<FoundStatus>().unwrap(), FoundStatus::Returned);
    }

    #[test]
    fn test_unknown_variant_is_reported() {
        let err = "borrowed".parse::<LoanKind>().unwrap_err();
        assert_eq!(err.kind, "loan kind");
        assert!(err.to_string().contains("borrowed"));
    }

    #[test]
    fn test_evidence_ref_serializes_as_plain_string() {
        let reference = EvidenceRef::new("file:///tmp/ab/abcd.jpg");
        let json = serde_json::to_string(&vec![reference.clone()]).unwrap();
        assert_eq!(json, r#"["file:///tmp/ab/abcd.jpg"]"#);
        assert_eq!(reference.as_str(), "file:///tmp/ab/abcd.jpg");
    }
}
