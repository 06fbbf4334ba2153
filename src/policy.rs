//! Grace-period policy for damage checks.
//!
//! For a short window after issuance a borrower may report damage that was
//! already there at hand-over. Reports are accepted the same way inside and
//! outside the window; the window only decides how a report is annotated and
//! which loans are chased for a check.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::ledger::Ledger;
use crate::model::{DamageFilter, LoanEvent, StudentId, Textbook};
use crate::notify::{CheckDeadline, Notification};

/// Default length of the damage-check window.
pub const DEFAULT_GRACE_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    window: Duration,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self::from_days(DEFAULT_GRACE_DAYS)
    }
}

impl GracePolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// End of the check window for an issue.
    pub fn deadline(&self, issue: &LoanEvent) -> DateTime<Utc> {
        issue.occurred_at + self.window
    }

    /// True when `report_time` falls inside the issue's check window, ends included.
    pub fn is_during_check_period(&self, issue: &LoanEvent, report_time: DateTime<Utc>) -> bool {
        report_time <= self.deadline(issue)
    }
}

/// An open loan whose check window is still running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageReminder {
    pub loan: LoanEvent,
    pub textbook: Textbook,
    pub deadline: DateTime<Utc>,
}

impl Ledger {
    /// Whether the textbook has a damage report filed since `issue`.
    async fn reported_since(&self, issue: &LoanEvent) -> Result<bool> {
        Ok(self
            .store()
            .list_damage_reports(&DamageFilter::for_textbook(issue.textbook_id))
            .await?
            .iter()
            .any(|r| r.reported_at >= issue.occurred_at))
    }

    /// Open loans past their check window with no damage report since issuance.
    ///
    /// Advisory only; nothing is blocked on it.
    pub async fn pending_check(&self, now: DateTime<Utc>) -> Result<Vec<LoanEvent>> {
        let policy = self.policy();
        let mut pending = Vec::new();
        for loan in self.open_loans().await?.into_values() {
            if now > policy.deadline(&loan) && !self.reported_since(&loan).await? {
                pending.push(loan);
            }
        }
        pending.sort_by_key(|e| (e.occurred_at, e.id));
        Ok(pending)
    }

    /// The student's open loans still inside their check window and not yet reported.
    pub async fn damage_reminder(
        &self,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DamageReminder>> {
        self.require_student(student_id).await?;
        let policy = self.policy();

        let mut reminders = Vec::new();
        for loan in self.active_loans(student_id).await? {
            if !policy.is_during_check_period(&loan, now) || self.reported_since(&loan).await? {
                continue;
            }
            let textbook = self.require_textbook(loan.textbook_id).await?;
            reminders.push(DamageReminder {
                deadline: policy.deadline(&loan),
                loan,
                textbook,
            });
        }
        Ok(reminders)
    }

    /// Ask the parent to check fresh loans for damage.
    ///
    /// Returns false when there was nothing to remind about.
    pub async fn send_damage_check_reminder(
        &self,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let reminders = self.damage_reminder(student_id, now).await?;
        if reminders.is_empty() {
            return Ok(false);
        }

        let student = self.require_student(student_id).await?;
        info!(student_id, textbooks = reminders.len(), "Damage check reminder queued");
        self.notify_parent(
            &student,
            Notification::DamageCheckReminder {
                student_name: student.full_name(),
                items: reminders
                    .into_iter()
                    .map(|r| CheckDeadline {
                        textbook: r.textbook.label(),
                        deadline: r.deadline,
                    })
                    .collect(),
            },
        );
        Ok(true)
    }
}
