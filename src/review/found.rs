//! Found reports.

use tracing::{info, warn};

use super::{FoundStatistics, FoundTarget};
use crate::error::{check_length, LedgerError, Result};
use crate::ledger::{Evidence, Ledger};
use crate::model::{
    FoundFilter, FoundReport, FoundReportId, FoundResolution, NewFoundReport, Student,
    Textbook, TextbookId, Transition, UserId,
};
use crate::notify::Notification;

impl Ledger {
    async fn current_borrower(&self, textbook_id: TextbookId) -> Result<Option<Student>> {
        match self.is_open_loan(textbook_id).await? {
            Some(issue) => Ok(self.store().get_student(issue.student_id).await?),
            None => Ok(None),
        }
    }

    async fn resolve_target(&self, target: &FoundTarget) -> Result<Textbook> {
        match target {
            FoundTarget::Id(id) => self.require_textbook(*id).await,
            FoundTarget::Code(code) => self
                .store()
                .find_textbook_by_code(code.trim())
                .await?
                .ok_or_else(|| LedgerError::not_found("textbook", code)),
        }
    }

    /// Record that a textbook turned up somewhere.
    ///
    /// Staff are told, and so is the borrower's parent when the textbook is
    /// on loan. The loan itself is left open.
    pub async fn report_found(
        &self,
        target: FoundTarget,
        reporter_id: UserId,
        found_location: &str,
        description: Option<&str>,
        evidence: Vec<Evidence>,
    ) -> Result<FoundReport> {
        check_length("found_location", found_location, 5, 200)?;
        if let Some(description) = description {
            check_length("description", description, 0, 500)?;
        }

        let textbook = self.resolve_target(&target).await?;
        let evidence = self.resolve_evidence(evidence).await?;

        let report = self
            .store()
            .insert_found_report(NewFoundReport {
                textbook_id: textbook.id,
                found_location: found_location.trim().to_string(),
                description: description.map(|d| d.trim().to_string()),
                evidence,
                reported_by: reporter_id,
                found_at: self.now(),
            })
            .await?;

        info!(
            report_id = report.id,
            textbook_id = textbook.id,
            reporter_id,
            "Found report filed"
        );

        self.notify_staff(Notification::FoundReported {
            textbook: textbook.label(),
            code: textbook.code.clone(),
            location: report.found_location.clone(),
        });

        match self.current_borrower(textbook.id).await {
            Ok(Some(student)) => self.notify_parent(
                &student,
                Notification::TextbookFound {
                    student_name: student.full_name(),
                    textbook: textbook.label(),
                    location: report.found_location.clone(),
                },
            ),
            Ok(None) => {}
            Err(e) => warn!(textbook_id = textbook.id, error = %e, "Could not load borrower for notification"),
        }

        Ok(report)
    }

    /// Confirm a found textbook was handed back. Fails with
    /// `AlreadyReturned` if someone got there first.
    ///
    /// Only the found report changes; closing the loan is a separate `return_`.
    pub async fn mark_as_returned(
        &self,
        report_id: FoundReportId,
        actor_id: UserId,
        notes: Option<&str>,
    ) -> Result<FoundReport> {
        if let Some(notes) = notes {
            check_length("notes", notes, 0, 500)?;
        }

        let transition = self
            .store()
            .mark_found_returned(
                report_id,
                FoundResolution {
                    returned_by: actor_id,
                    returned_at: self.now(),
                    notes: notes.map(|n| n.trim().to_string()),
                },
            )
            .await?
            .ok_or_else(|| LedgerError::not_found("found report", report_id))?;

        match transition {
            Transition::Applied(report) => {
                info!(report_id, actor_id, "Found textbook marked as returned");
                Ok(report)
            }
            Transition::AlreadyFinal(_) => Err(LedgerError::AlreadyReturned(report_id)),
        }
    }

    pub async fn found_report(&self, report_id: FoundReportId) -> Result<FoundReport> {
        self.store()
            .get_found_report(report_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("found report", report_id))
    }

    pub async fn list_found_reports(&self, filter: &FoundFilter) -> Result<Vec<FoundReport>> {
        Ok(self.store().list_found_reports(filter).await?)
    }

    /// Every found report of a textbook, oldest first.
    pub async fn found_history(&self, textbook_id: TextbookId) -> Result<Vec<FoundReport>> {
        self.require_textbook(textbook_id).await?;
        self.list_found_reports(&FoundFilter::for_textbook(textbook_id))
            .await
    }

    pub async fn found_statistics(&self) -> Result<FoundStatistics> {
        let reports = self.list_found_reports(&FoundFilter::all()).await?;
        Ok(FoundStatistics::from_reports(&reports))
    }
}
