//! Found reports: a missing textbook turned up somewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EvidenceRef, FoundReportId, TextbookId, UserId};

/// `Found -> Returned`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoundStatus {
    Found,
    Returned,
}

text_enum!(FoundStatus, "found status", {
    Found => "found",
    Returned => "returned",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundReport {
    pub id: FoundReportId,
    pub textbook_id: TextbookId,
    pub found_location: String,
    pub description: Option<String>,
    pub evidence: Vec<EvidenceRef>,
    pub status: FoundStatus,
    pub notes: Option<String>,
    pub reported_by: UserId,
    pub returned_by: Option<UserId>,
    pub found_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewFoundReport {
    pub textbook_id: TextbookId,
    pub found_location: String,
    pub description: Option<String>,
    pub evidence: Vec<EvidenceRef>,
    pub reported_by: UserId,
    pub found_at: DateTime<Utc>,
}

/// Staff confirmation recorded by the `Found -> Returned` transition.
#[derive(Debug, Clone)]
pub struct FoundResolution {
    pub returned_by: UserId,
    pub returned_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FoundFilter {
    pub textbook_id: Option<TextbookId>,
    pub status: Option<FoundStatus>,
    pub offset: u64,
    pub limit: u64,
}

impl Default for FoundFilter {
    fn default() -> Self {
        Self {
            textbook_id: None,
            status: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl FoundFilter {
    pub fn all() -> Self {
        Self {
            limit: u64::MAX,
            ..Self::default()
        }
    }

    pub fn for_textbook(textbook_id: TextbookId) -> Self {
        Self {
            textbook_id: Some(textbook_id),
            ..Self::all()
        }
    }

    pub fn matches(&self, report: &FoundReport) -> bool {
        self.textbook_id.is_none_or(|id| id == report.textbook_id)
            && self.status.is_none_or(|s| s == report.status)
    }
}
