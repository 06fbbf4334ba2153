//! Damage reports and their review lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DamageReportId, EvidenceRef, StudentId, TextbookId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageCategory {
    Minor,
    Moderate,
    Severe,
    Lost,
}

text_enum!(DamageCategory, "damage category", {
    Minor => "minor",
    Moderate => "moderate",
    Severe => "severe",
    Lost => "lost",
});

/// `Pending -> Checked`, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Checked,
}

text_enum!(ReviewStatus, "review status", {
    Pending => "pending",
    Checked => "checked",
});

/// Role of whoever filed a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReporterRole {
    Student,
    Teacher,
}

text_enum!(ReporterRole, "reporter role", {
    Student => "student",
    Teacher => "teacher",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageReport {
    pub id: DamageReportId,
    pub textbook_id: TextbookId,
    /// Borrower of the open loan when the report was filed.
    pub student_id: Option<StudentId>,
    pub reporter_id: UserId,
    pub reporter_role: ReporterRole,
    pub category: DamageCategory,
    pub description: String,
    pub evidence: Vec<EvidenceRef>,
    /// `None` when the textbook was not on loan at report time.
    pub is_during_check_period: Option<bool>,
    pub status: ReviewStatus,
    pub decision: Option<String>,
    pub checked_by: Option<UserId>,
    pub checked_at: Option<DateTime<Utc>>,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDamageReport {
    pub textbook_id: TextbookId,
    pub student_id: Option<StudentId>,
    pub reporter_id: UserId,
    pub reporter_role: ReporterRole,
    pub category: DamageCategory,
    pub description: String,
    pub evidence: Vec<EvidenceRef>,
    pub is_during_check_period: Option<bool>,
    pub reported_at: DateTime<Utc>,
}

/// Staff resolution recorded by the `Pending -> Checked` transition.
#[derive(Debug, Clone)]
pub struct DamageDecision {
    pub decision: String,
    pub checked_by: UserId,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DamageFilter {
    pub textbook_id: Option<TextbookId>,
    pub category: Option<DamageCategory>,
    pub status: Option<ReviewStatus>,
    pub offset: u64,
    pub limit: u64,
}

impl Default for DamageFilter {
    fn default() -> Self {
        Self {
            textbook_id: None,
            category: None,
            status: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl DamageFilter {
    /// Every report, unpaginated.
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

    pub fn matches(&self, report: &DamageReport) -> bool {
        self.textbook_id.is_none_or(|id| id == report.textbook_id)
            && self.category.is_none_or(|c| c == report.category)
            && self.status.is_none_or(|s| s == report.status)
    }
}
