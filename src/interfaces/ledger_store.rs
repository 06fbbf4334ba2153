//! Record store interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{
    DamageDecision, DamageFilter, DamageReport, DamageReportId, FoundFilter, FoundReport,
    FoundReportId, FoundResolution, IssueDraft, IssueOutcome, LoanEvent, LoanFilter, NewDamageReport,
    NewFoundReport, NewStudent, NewTextbook, NewUser, ReturnDraft, ReturnOutcome, Student,
    StudentId, Textbook, TextbookFilter, TextbookId, Transition, UnknownVariant, User, UserId,
};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Duplicate value violates unique constraint: {0}")]
    Duplicate(String),

    #[error("Invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    #[error("Corrupt row: {0}")]
    UnknownVariant(#[from] UnknownVariant),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

impl StorageError {
    /// Map unique-constraint violations to `Duplicate`, leaving other errors as they are.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StorageError::Duplicate(db.message().to_string())
            }
            _ => StorageError::Database(err),
        }
    }
}

/// Interface for the ledger's durable records.
///
/// Loan events, damage reports and found reports are append-only. The
/// only mutations are the roster flags and the two one-shot review
/// transitions, both expressed as conditional writes.
///
/// Implementations:
/// - `SqliteLedgerStore`: SQLite storage
/// - `MockLedgerStore`: In-memory store for tests and dry runs
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ------------------------------------------------------------------
    // Textbooks
    // ------------------------------------------------------------------

    /// Insert a textbook. Fails with `Duplicate` when the code is taken.
    async fn insert_textbook(&self, textbook: NewTextbook) -> Result<Textbook>;

    async fn get_textbook(&self, id: TextbookId) -> Result<Option<Textbook>>;

    async fn find_textbook_by_code(&self, code: &str) -> Result<Option<Textbook>>;

    async fn list_textbooks(&self, filter: &TextbookFilter) -> Result<Vec<Textbook>>;

    async fn update_textbook_condition(
        &self,
        id: TextbookId,
        condition: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Textbook>>;

    async fn set_textbook_active(
        &self,
        id: TextbookId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Textbook>>;

    // ------------------------------------------------------------------
    // Students and users
    // ------------------------------------------------------------------

    async fn insert_student(&self, student: NewStudent) -> Result<Student>;

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>>;

    /// Students ordered by last then first name.
    async fn list_students(&self, grade: Option<&str>, active_only: bool) -> Result<Vec<Student>>;

    async fn set_student_active(
        &self,
        id: StudentId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Student>>;

    /// Insert a user. Fails with `Duplicate` when the username is taken or
    /// the student already has an account.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_student(&self, student_id: StudentId) -> Result<Option<User>>;

    // ------------------------------------------------------------------
    // Loan log
    // ------------------------------------------------------------------

    /// All loan events of a textbook ordered by `(occurred_at, id)`.
    async fn loan_events_for_textbook(&self, textbook_id: TextbookId) -> Result<Vec<LoanEvent>>;

    /// All loan events attributed to a student ordered by `(occurred_at, id)`.
    async fn loan_events_for_student(&self, student_id: StudentId) -> Result<Vec<LoanEvent>>;

    async fn list_loan_events(&self, filter: &LoanFilter) -> Result<Vec<LoanEvent>>;

    /// Append a completed `Issue` unless the textbook has an open loan.
    ///
    /// The open-loan check and the insert happen in one transaction that
    /// excludes concurrent writers, so two racing issues cannot both succeed.
    async fn issue_if_available(&self, draft: IssueDraft) -> Result<IssueOutcome>;

    /// Append a completed `Return` for the textbook's open loan, if any.
    ///
    /// Same transactional guarantee as `issue_if_available`.
    async fn return_if_on_loan(&self, draft: ReturnDraft) -> Result<ReturnOutcome>;

    // ------------------------------------------------------------------
    // Damage reports
    // ------------------------------------------------------------------

    async fn insert_damage_report(&self, report: NewDamageReport) -> Result<DamageReport>;

    async fn get_damage_report(&self, id: DamageReportId) -> Result<Option<DamageReport>>;

    /// Reports ordered by `reported_at`.
    async fn list_damage_reports(&self, filter: &DamageFilter) -> Result<Vec<DamageReport>>;

    /// Move a report from `Pending` to `Checked`. `None` when the report does not exist.
    async fn check_damage_report(
        &self,
        id: DamageReportId,
        decision: DamageDecision,
    ) -> Result<Option<Transition<DamageReport>>>;

    // ------------------------------------------------------------------
    // Found reports
    // ------------------------------------------------------------------

    async fn insert_found_report(&self, report: NewFoundReport) -> Result<FoundReport>;

    async fn get_found_report(&self, id: FoundReportId) -> Result<Option<FoundReport>>;

    /// Reports ordered by `found_at`.
    async fn list_found_reports(&self, filter: &FoundFilter) -> Result<Vec<FoundReport>>;

    /// Move a report from `Found` to `Returned`. `None` when the report does not exist.
    async fn mark_found_returned(
        &self,
        id: FoundReportId,
        resolution: FoundResolution,
    ) -> Result<Option<Transition<FoundReport>>>;
}
