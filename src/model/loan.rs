//! Loan events: the append-only issue/return log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EvidenceRef, LoanEventId, StudentId, TextbookId, UserId};

/// What a loan event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanKind {
    Issue,
    Return,
}

text_enum!(LoanKind, "loan kind", {
    Issue => "issue",
    Return => "return",
});

/// Lifecycle status of a loan event.
///
/// Only `Completed` events take part in reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Completed,
    Cancelled,
}

text_enum!(LoanStatus, "loan status", {
    Pending => "pending",
    Completed => "completed",
    Cancelled => "cancelled",
});

/// An immutable issue or return fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanEvent {
    pub id: LoanEventId,
    pub textbook_id: TextbookId,
    pub student_id: StudentId,
    pub kind: LoanKind,
    pub status: LoanStatus,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: UserId,
    pub evidence: Vec<EvidenceRef>,
    pub notes: Option<String>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl LoanEvent {
    pub fn is_completed(&self) -> bool {
        self.status == LoanStatus::Completed
    }

    pub fn is_completed_issue(&self) -> bool {
        self.is_completed() && self.kind == LoanKind::Issue
    }

    pub fn is_completed_return(&self) -> bool {
        self.is_completed() && self.kind == LoanKind::Return
    }
}

/// Input for appending an `Issue` event.
#[derive(Debug, Clone)]
pub struct IssueDraft {
    pub textbook_id: TextbookId,
    pub student_id: StudentId,
    pub actor_id: UserId,
    pub evidence: Vec<EvidenceRef>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl IssueDraft {
    /// The completed event this draft becomes once stored. `id` is assigned by the store.
    pub fn into_event(self) -> LoanEvent {
        LoanEvent {
            id: 0,
            textbook_id: self.textbook_id,
            student_id: self.student_id,
            kind: LoanKind::Issue,
            status: LoanStatus::Completed,
            occurred_at: self.occurred_at,
            actor_id: self.actor_id,
            evidence: self.evidence,
            notes: self.notes,
            returned_at: None,
        }
    }
}

/// Input for appending a `Return` event.
///
/// The student is taken from the open issue inside the store transaction.
#[derive(Debug, Clone)]
pub struct ReturnDraft {
    pub textbook_id: TextbookId,
    pub actor_id: UserId,
    pub evidence: Vec<EvidenceRef>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ReturnDraft {
    /// The completed event this draft becomes, attributed to the borrower of the open issue.
    pub fn into_event(self, student_id: StudentId) -> LoanEvent {
        LoanEvent {
            id: 0,
            textbook_id: self.textbook_id,
            student_id,
            kind: LoanKind::Return,
            status: LoanStatus::Completed,
            occurred_at: self.occurred_at,
            actor_id: self.actor_id,
            evidence: self.evidence,
            notes: self.notes,
            returned_at: Some(self.occurred_at),
        }
    }
}

/// Outcome of a transactional check-and-insert for an issue.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    Issued(LoanEvent),
    /// The textbook already has an open loan; nothing was written.
    AlreadyOnLoan(LoanEvent),
}

/// Outcome of a transactional check-and-insert for a return.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnOutcome {
    Returned { issue: LoanEvent, event: LoanEvent },
    /// No open loan exists; nothing was written.
    NotOnLoan,
}

/// Filter for listing loan events. Unset fields match everything.
#[derive(Debug, Clone)]
pub struct LoanFilter {
    pub textbook_id: Option<TextbookId>,
    pub student_id: Option<StudentId>,
    pub kind: Option<LoanKind>,
    pub status: Option<LoanStatus>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub offset: u64,
    pub limit: u64,
}

impl Default for LoanFilter {
    fn default() -> Self {
        Self {
            textbook_id: None,
            student_id: None,
            kind: None,
            status: None,
            since: None,
            until: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl LoanFilter {
    /// Every completed issue event, unpaginated.
    pub fn completed_issues() -> Self {
        Self {
            kind: Some(LoanKind::Issue),
            status: Some(LoanStatus::Completed),
            limit: u64::MAX,
            ..Self::default()
        }
    }

    pub fn matches(&self, event: &LoanEvent) -> bool {
        self.textbook_id.is_none_or(|id| id == event.textbook_id)
            && self.student_id.is_none_or(|id| id == event.student_id)
            && self.kind.is_none_or(|kind| kind == event.kind)
            && self.status.is_none_or(|status| status == event.status)
            && self.since.is_none_or(|since| event.occurred_at >= since)
            && self.until.is_none_or(|until| event.occurred_at <= until)
    }
}
