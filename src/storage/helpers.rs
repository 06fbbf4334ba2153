//! Shared helpers for storage implementations.
//!
//! Centralises timestamp and evidence-list encoding so every backend
//! stores identical text.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::interfaces::ledger_store::{Result, StorageError};
use crate::model::EvidenceRef;

/// Encode a timestamp as fixed-width RFC 3339 with microseconds and a `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a timestamp written by `format_timestamp`.
pub fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            column,
            value: value.to_string(),
        })
}

pub fn parse_optional_timestamp(
    column: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, &v)).transpose()
}

/// Evidence references are stored as a JSON array of strings.
pub fn encode_evidence(evidence: &[EvidenceRef]) -> Result<String> {
    Ok(serde_json::to_string(evidence)?)
}

pub fn decode_evidence(raw: &str) -> Result<Vec<EvidenceRef>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_text_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);
        let a = format_timestamp(earlier);
        let b = format_timestamp(later);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp("occurred_at", &b).unwrap(), later);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("found_at", "yesterday").unwrap_err();
        assert!(matches!(
            err,
            StorageError::InvalidTimestamp { column: "found_at", .. }
        ));
    }

    #[test]
    fn test_evidence_encoding() {
        let refs = vec![EvidenceRef::new("a"), EvidenceRef::new("b")];
        let raw = encode_evidence(&refs).unwrap();
        assert_eq!(decode_evidence(&raw).unwrap(), refs);
        assert!(decode_evidence("").unwrap().is_empty());
        assert!(decode_evidence("[]").unwrap().is_empty());
    }
}
