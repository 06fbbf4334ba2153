//! Derived reports over the loan log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::Ledger;
use crate::error::Result;
use crate::model::{
    DamageCategory, DamageFilter, DamageReport, DamageReportId, FoundFilter, FoundReport,
    LoanEvent, LoanFilter, LoanStatus, ReviewStatus, Student, StudentId, TextbookId,
};
use crate::notify::Notification;
use crate::review::DamageStatistics;

/// A student together with their open loans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentLoans {
    pub student: Student,
    pub loans: Vec<LoanEvent>,
}

/// One issue cycle in a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLine {
    pub textbook_id: TextbookId,
    pub code: String,
    pub label: String,
    pub issued_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub student: Student,
    /// Every issue cycle, returned or not.
    pub issued: Vec<SummaryLine>,
    pub returned: Vec<SummaryLine>,
    pub not_returned: Vec<SummaryLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSummary {
    pub total_students: usize,
    pub total_issued: usize,
    pub total_returned: usize,
    pub total_not_returned: usize,
    pub students: Vec<StudentSummary>,
}

/// One damage report in a per-student summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageLine {
    pub report_id: DamageReportId,
    pub textbook_id: TextbookId,
    pub label: String,
    pub category: DamageCategory,
    pub description: String,
    pub status: ReviewStatus,
    pub reported_at: DateTime<Utc>,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDamage {
    pub student: Student,
    pub reports: Vec<DamageLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageSummary {
    pub statistics: DamageStatistics,
    pub students: Vec<StudentDamage>,
}

/// One entry of a textbook's merged history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "record", rename_all = "snake_case")]
pub enum HistoryEntry {
    Loan(LoanEvent),
    Damage(DamageReport),
    Found(FoundReport),
}

impl HistoryEntry {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Loan(e) => e.occurred_at,
            HistoryEntry::Damage(r) => r.reported_at,
            HistoryEntry::Found(r) => r.found_at,
        }
    }
}

/// First completed return at or after `issue` in the same textbook's log.
fn closing_return(log: &[LoanEvent], issue: &LoanEvent) -> Option<DateTime<Utc>> {
    log.iter()
        .filter(|e| e.is_completed_return() && e.occurred_at >= issue.occurred_at)
        .map(|e| e.occurred_at)
        .min()
}

impl Ledger {
    /// Students (optionally of one grade) who still hold textbooks.
    ///
    /// Deactivated students are included while they hold a loan.
    pub async fn not_returned(&self, grade: Option<&str>) -> Result<Vec<StudentLoans>> {
        let students = self.store.list_students(grade, false).await?;
        let mut by_student: BTreeMap<_, Vec<LoanEvent>> = BTreeMap::new();
        for loan in self.open_loans().await?.into_values() {
            by_student.entry(loan.student_id).or_default().push(loan);
        }

        Ok(students
            .into_iter()
            .filter_map(|student| {
                by_student.remove(&student.id).map(|mut loans| {
                    loans.sort_by_key(|e| (e.occurred_at, e.id));
                    StudentLoans { student, loans }
                })
            })
            .collect())
    }

    /// Active students (optionally of one grade) holding no textbooks.
    pub async fn not_issued(&self, grade: Option<&str>) -> Result<Vec<Student>> {
        let students = self.store.list_students(grade, true).await?;
        let open = self.open_loans().await?;

        Ok(students
            .into_iter()
            .filter(|s| !open.values().any(|loan| loan.student_id == s.id))
            .collect())
    }

    /// Every issue cycle of the grade's students, split into returned and not.
    pub async fn issue_summary(&self, grade: Option<&str>) -> Result<GradeSummary> {
        let students = self.store.list_students(grade, false).await?;
        let events = self
            .store
            .list_loan_events(&LoanFilter {
                status: Some(LoanStatus::Completed),
                limit: u64::MAX,
                ..LoanFilter::default()
            })
            .await?;

        let mut logs: BTreeMap<TextbookId, Vec<LoanEvent>> = BTreeMap::new();
        for event in &events {
            logs.entry(event.textbook_id).or_default().push(event.clone());
        }

        let mut summaries = Vec::new();
        for student in students {
            let mut summary = StudentSummary {
                student,
                issued: Vec::new(),
                returned: Vec::new(),
                not_returned: Vec::new(),
            };

            let issues = events
                .iter()
                .filter(|e| e.is_completed_issue() && e.student_id == summary.student.id);
            for issue in issues {
                let Some(textbook) = self.store.get_textbook(issue.textbook_id).await? else {
                    continue;
                };
                let log = logs.get(&issue.textbook_id).map(Vec::as_slice).unwrap_or(&[]);
                let line = SummaryLine {
                    textbook_id: textbook.id,
                    label: textbook.label(),
                    code: textbook.code,
                    issued_at: issue.occurred_at,
                    returned_at: closing_return(log, issue),
                };
                if line.returned_at.is_some() {
                    summary.returned.push(line.clone());
                } else {
                    summary.not_returned.push(line.clone());
                }
                summary.issued.push(line);
            }

            if !summary.issued.is_empty() {
                summaries.push(summary);
            }
        }

        Ok(GradeSummary {
            total_students: summaries.len(),
            total_issued: summaries.iter().map(|s| s.issued.len()).sum(),
            total_returned: summaries.iter().map(|s| s.returned.len()).sum(),
            total_not_returned: summaries.iter().map(|s| s.not_returned.len()).sum(),
            students: summaries,
        })
    }

    /// Damage reports grouped by the student they are attributed to.
    ///
    /// With a grade, reports of other students (and unattributed ones) are
    /// left out of the statistics too.
    pub async fn damage_summary(
        &self,
        grade: Option<&str>,
        category: Option<DamageCategory>,
        status: Option<ReviewStatus>,
    ) -> Result<DamageSummary> {
        let students = self.store.list_students(grade, false).await?;
        let known: BTreeSet<StudentId> = students.iter().map(|s| s.id).collect();
        let reports = self
            .store
            .list_damage_reports(&DamageFilter {
                category,
                status,
                ..DamageFilter::all()
            })
            .await?;

        let mut counted = Vec::with_capacity(reports.len());
        let mut grouped: BTreeMap<StudentId, Vec<DamageLine>> = BTreeMap::new();
        for report in reports {
            let student_id = report.student_id.filter(|id| known.contains(id));
            if student_id.is_none() && grade.is_some() {
                continue;
            }
            if let Some(student_id) = student_id {
                if let Some(textbook) = self.store.get_textbook(report.textbook_id).await? {
                    grouped.entry(student_id).or_default().push(DamageLine {
                        report_id: report.id,
                        textbook_id: textbook.id,
                        label: textbook.label(),
                        category: report.category,
                        description: report.description.clone(),
                        status: report.status,
                        reported_at: report.reported_at,
                        checked_at: report.checked_at,
                    });
                }
            }
            counted.push(report);
        }

        Ok(DamageSummary {
            statistics: DamageStatistics::from_reports(&counted),
            students: students
                .into_iter()
                .filter_map(|student| {
                    grouped
                        .remove(&student.id)
                        .map(|reports| StudentDamage { student, reports })
                })
                .collect(),
        })
    }

    /// Loan, damage and found records of a textbook, oldest first.
    pub async fn textbook_history(&self, textbook_id: TextbookId) -> Result<Vec<HistoryEntry>> {
        self.require_textbook(textbook_id).await?;

        let mut entries: Vec<HistoryEntry> = self
            .store
            .loan_events_for_textbook(textbook_id)
            .await?
            .into_iter()
            .map(HistoryEntry::Loan)
            .collect();
        entries.extend(
            self.store
                .list_damage_reports(&DamageFilter::for_textbook(textbook_id))
                .await?
                .into_iter()
                .map(HistoryEntry::Damage),
        );
        entries.extend(
            self.store
                .list_found_reports(&FoundFilter::for_textbook(textbook_id))
                .await?
                .into_iter()
                .map(HistoryEntry::Found),
        );

        // Stable sort keeps loan, damage, found order on equal timestamps.
        entries.sort_by_key(HistoryEntry::at);
        Ok(entries)
    }

    /// Tell each parent in the grade which textbooks their child holds.
    ///
    /// Returns the number of messages queued.
    pub async fn send_issue_summaries(&self, grade: &str) -> Result<usize> {
        let mut sent = 0;
        for holder in self.not_returned(Some(grade)).await? {
            if holder.student.parent_phone.is_none() {
                continue;
            }
            let labels = self.labels(holder.loans.iter().map(|l| l.textbook_id)).await?;
            self.notify_parent(
                &holder.student,
                Notification::IssueSummary {
                    student_name: holder.student.full_name(),
                    textbooks: labels,
                },
            );
            sent += 1;
        }
        info!(grade, sent, "Issue summaries queued");
        Ok(sent)
    }

    /// Remind each parent in the grade which textbooks are still out.
    ///
    /// Returns the number of messages queued.
    pub async fn send_return_reminders(&self, grade: &str) -> Result<usize> {
        let mut sent = 0;
        for holder in self.not_returned(Some(grade)).await? {
            if holder.student.parent_phone.is_none() {
                continue;
            }
            let labels = self.labels(holder.loans.iter().map(|l| l.textbook_id)).await?;
            self.notify_parent(
                &holder.student,
                Notification::ReturnReminder {
                    student_name: holder.student.full_name(),
                    textbooks: labels,
                },
            );
            sent += 1;
        }
        info!(grade, sent, "Return reminders queued");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoanKind, LoanStatus};
    use chrono::{Duration, TimeZone};

    fn event(id: i64, kind: LoanKind, at: DateTime<Utc>) -> LoanEvent {
        LoanEvent {
            id,
            textbook_id: 1,
            student_id: 10,
            kind,
            status: LoanStatus::Completed,
            occurred_at: at,
            actor_id: 1,
            evidence: vec![],
            notes: None,
            returned_at: None,
        }
    }

    #[test]
    fn test_closing_return_picks_first_return_after_issue() {
        let t0 = Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap();
        let log = vec![
            event(1, LoanKind::Issue, t0),
            event(2, LoanKind::Return, t0 + Duration::days(10)),
            event(3, LoanKind::Issue, t0 + Duration::days(20)),
        ];
        assert_eq!(closing_return(&log, &log[0]), Some(t0 + Duration::days(10)));
        assert_eq!(closing_return(&log, &log[2]), None);
    }
}
