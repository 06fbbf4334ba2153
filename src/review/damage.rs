//! Damage reports.

use tracing::{info, warn};

use super::{DamageStatistics, Reporter};
use crate::error::{check_length, LedgerError, Result};
use crate::ledger::{Evidence, Ledger};
use crate::model::{
    DamageCategory, DamageDecision, DamageFilter, DamageReport, DamageReportId, NewDamageReport,
    TextbookId, Transition, UserId,
};
use crate::notify::Notification;

impl Ledger {
    /// File a damage report.
    ///
    /// A student may only report a textbook currently on loan to them. The
    /// report is annotated with whether it falls inside the borrower's check
    /// window; the annotation never changes whether it is accepted.
    pub async fn report_damage(
        &self,
        textbook_id: TextbookId,
        reporter: Reporter,
        category: DamageCategory,
        description: &str,
        evidence: Vec<Evidence>,
    ) -> Result<DamageReport> {
        check_length("description", description, 10, 1000)?;
        let textbook = self.require_textbook(textbook_id).await?;
        let open = self.is_open_loan(textbook_id).await?;

        if let Reporter::Student { student_id, .. } = reporter {
            match &open {
                None => return Err(LedgerError::NotIssued { textbook_id }),
                Some(issue) if issue.student_id != student_id => {
                    return Err(LedgerError::NotBorrower {
                        textbook_id,
                        student_id,
                    })
                }
                Some(_) => {}
            }
        }

        let now = self.now();
        let evidence = self.resolve_evidence(evidence).await?;
        let report = self
            .store()
            .insert_damage_report(NewDamageReport {
                textbook_id,
                student_id: open.as_ref().map(|i| i.student_id),
                reporter_id: reporter.user_id(),
                reporter_role: reporter.role(),
                category,
                description: description.trim().to_string(),
                evidence,
                is_during_check_period: open
                    .as_ref()
                    .map(|i| self.policy().is_during_check_period(i, now)),
                reported_at: now,
            })
            .await?;

        info!(
            report_id = report.id,
            textbook_id,
            category = %category,
            during_check_period = ?report.is_during_check_period,
            "Damage report filed"
        );

        let borrower = match report.student_id {
            Some(id) => self.store().get_student(id).await.unwrap_or_else(|e| {
                warn!(student_id = id, error = %e, "Could not load borrower for notification");
                None
            }),
            None => None,
        };

        self.notify_staff(Notification::DamageReported {
            textbook: textbook.label(),
            code: textbook.code.clone(),
            category: category.to_string(),
            student_name: borrower.as_ref().map(|s| s.full_name()),
            during_check_period: report.is_during_check_period,
            description: report.description.clone(),
        });

        if category == DamageCategory::Lost {
            match &borrower {
                Some(student) => self.notify_parent(
                    student,
                    Notification::TextbookLost {
                        student_name: student.full_name(),
                        textbook: textbook.label(),
                    },
                ),
                None => warn!(textbook_id, "Lost report for a textbook that is not on loan"),
            }
        }

        Ok(report)
    }

    /// File a `Lost` damage report.
    pub async fn report_lost(
        &self,
        textbook_id: TextbookId,
        reporter: Reporter,
        description: &str,
        evidence: Vec<Evidence>,
    ) -> Result<DamageReport> {
        self.report_damage(
            textbook_id,
            reporter,
            DamageCategory::Lost,
            description,
            evidence,
        )
        .await
    }

    /// Record a staff decision on a pending report. Fails with
    /// `AlreadyChecked` if someone got there first.
    pub async fn check_damage_report(
        &self,
        report_id: DamageReportId,
        actor_id: UserId,
        decision: &str,
    ) -> Result<DamageReport> {
        check_length("decision", decision, 1, 500)?;

        let transition = self
            .store()
            .check_damage_report(
                report_id,
                DamageDecision {
                    decision: decision.trim().to_string(),
                    checked_by: actor_id,
                    checked_at: self.now(),
                },
            )
            .await?
            .ok_or_else(|| LedgerError::not_found("damage report", report_id))?;

        match transition {
            Transition::Applied(report) => {
                info!(report_id, actor_id, "Damage report checked");
                Ok(report)
            }
            Transition::AlreadyFinal(_) => Err(LedgerError::AlreadyChecked(report_id)),
        }
    }

    pub async fn damage_report(&self, report_id: DamageReportId) -> Result<DamageReport> {
        self.store()
            .get_damage_report(report_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("damage report", report_id))
    }

    pub async fn list_damage_reports(&self, filter: &DamageFilter) -> Result<Vec<DamageReport>> {
        Ok(self.store().list_damage_reports(filter).await?)
    }

    /// Every damage report of a textbook, oldest first.
    pub async fn damage_history(&self, textbook_id: TextbookId) -> Result<Vec<DamageReport>> {
        self.require_textbook(textbook_id).await?;
        self.list_damage_reports(&DamageFilter::for_textbook(textbook_id))
            .await
    }

    pub async fn damage_statistics(&self) -> Result<DamageStatistics> {
        let reports = self.list_damage_reports(&DamageFilter::all()).await?;
        Ok(DamageStatistics::from_reports(&reports))
    }
}
