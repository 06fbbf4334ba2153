//! Damage and found report workflow.
//!
//! Both report kinds have a one-shot review: `Pending -> Checked` for damage,
//! `Found -> Returned` for found textbooks. The transition is a conditional
//! write in the store, so of two concurrent reviewers exactly one wins and
//! the other gets `AlreadyChecked` / `AlreadyReturned`.

mod damage;
mod found;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{
    DamageCategory, DamageReport, FoundReport, FoundStatus, ReporterRole, ReviewStatus, StudentId,
    TextbookId, UserId,
};

/// Who is filing a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reporter {
    /// A student reporting on a textbook they hold.
    Student {
        user_id: UserId,
        student_id: StudentId,
    },
    Staff {
        user_id: UserId,
    },
}

impl Reporter {
    pub fn user_id(&self) -> UserId {
        match self {
            Reporter::Student { user_id, .. } | Reporter::Staff { user_id } => *user_id,
        }
    }

    pub fn role(&self) -> ReporterRole {
        match self {
            Reporter::Student { .. } => ReporterRole::Student,
            Reporter::Staff { .. } => ReporterRole::Teacher,
        }
    }
}

/// How a found report names its textbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoundTarget {
    Id(TextbookId),
    /// Scanned code.
    Code(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DamageStatistics {
    pub total: usize,
    pub pending: usize,
    pub checked: usize,
    pub by_category: BTreeMap<DamageCategory, usize>,
    /// Reports filed inside the borrower's check window.
    pub during_check_period: usize,
}

impl DamageStatistics {
    pub fn from_reports(reports: &[DamageReport]) -> Self {
        let mut stats = Self {
            total: reports.len(),
            ..Self::default()
        };
        for report in reports {
            match report.status {
                ReviewStatus::Pending => stats.pending += 1,
                ReviewStatus::Checked => stats.checked += 1,
            }
            *stats.by_category.entry(report.category).or_default() += 1;
            if report.is_during_check_period == Some(true) {
                stats.during_check_period += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FoundStatistics {
    pub total: usize,
    pub found: usize,
    pub returned: usize,
    /// Percentage of reports resolved as returned; 0 when there are none.
    pub return_rate: f64,
}

impl FoundStatistics {
    pub fn from_reports(reports: &[FoundReport]) -> Self {
        let returned = reports
            .iter()
            .filter(|r| r.status == FoundStatus::Returned)
            .count();
        let total = reports.len();
        let return_rate = if total == 0 {
            0.0
        } else {
            returned as f64 / total as f64 * 100.0
        };
        Self {
            total,
            found: total - returned,
            returned,
            return_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn damage(category: DamageCategory, status: ReviewStatus, in_window: Option<bool>) -> DamageReport {
        DamageReport {
            id: 1,
            textbook_id: 1,
            student_id: Some(1),
            reporter_id: 1,
            reporter_role: ReporterRole::Student,
            category,
            description: "Coffee stain on pages 10-20".to_string(),
            evidence: vec![],
            is_during_check_period: in_window,
            status,
            decision: None,
            checked_by: None,
            checked_at: None,
            reported_at: Utc::now(),
        }
    }

    fn found(status: FoundStatus) -> FoundReport {
        FoundReport {
            id: 1,
            textbook_id: 1,
            found_location: "Cafeteria".to_string(),
            description: None,
            evidence: vec![],
            status,
            notes: None,
            reported_by: 1,
            returned_by: None,
            found_at: Utc::now(),
            returned_at: None,
        }
    }

    #[test]
    fn test_reporter_roles() {
        let student = Reporter::Student {
            user_id: 5,
            student_id: 9,
        };
        assert_eq!(student.user_id(), 5);
        assert_eq!(student.role(), ReporterRole::Student);
        assert_eq!(Reporter::Staff { user_id: 2 }.role(), ReporterRole::Teacher);
    }

    #[test]
    fn test_damage_statistics() {
        let stats = DamageStatistics::from_reports(&[
            damage(DamageCategory::Minor, ReviewStatus::Pending, Some(true)),
            damage(DamageCategory::Minor, ReviewStatus::Checked, Some(false)),
            damage(DamageCategory::Lost, ReviewStatus::Pending, None),
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.checked, 1);
        assert_eq!(stats.by_category.get(&DamageCategory::Minor), Some(&2));
        assert_eq!(stats.by_category.get(&DamageCategory::Lost), Some(&1));
        assert_eq!(stats.during_check_period, 1);
    }

    #[test]
    fn test_found_return_rate() {
        assert_eq!(FoundStatistics::from_reports(&[]).return_rate, 0.0);

        let stats = FoundStatistics::from_reports(&[
            found(FoundStatus::Returned),
            found(FoundStatus::Found),
            found(FoundStatus::Found),
            found(FoundStatus::Returned),
        ]);
        assert_eq!(stats.found, 2);
        assert_eq!(stats.returned, 2);
        assert!((stats.return_rate - 50.0).abs() < f64::EPSILON);
    }
}
