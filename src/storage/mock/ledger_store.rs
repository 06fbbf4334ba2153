//! Mock LedgerStore implementation for testing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::interfaces::ledger_store::{LedgerStore, Result, StorageError};
use crate::ledger::reconcile::{issue_timestamp, open_loan};
use crate::model::{
    DamageDecision, DamageFilter, DamageReport, DamageReportId, FoundFilter, FoundReport,
    FoundReportId, FoundResolution, FoundStatus, IssueDraft, IssueOutcome, LoanEvent, LoanFilter,
    NewDamageReport, NewFoundReport, NewStudent, NewTextbook, NewUser, ReturnDraft, ReturnOutcome,
    ReviewStatus, Student, StudentId, Textbook, TextbookFilter, TextbookId, Transition, User,
    UserId,
};

/// Every table behind one lock, so check-and-insert is atomic.
#[derive(Default)]
struct Tables {
    next_id: i64,
    textbooks: BTreeMap<TextbookId, Textbook>,
    students: BTreeMap<StudentId, Student>,
    users: BTreeMap<UserId, User>,
    loan_events: Vec<LoanEvent>,
    damage_reports: Vec<DamageReport>,
    found_reports: Vec<FoundReport>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn textbook_log(&self, textbook_id: TextbookId) -> Vec<LoanEvent> {
        let mut log: Vec<LoanEvent> = self
            .loan_events
            .iter()
            .filter(|e| e.textbook_id == textbook_id)
            .cloned()
            .collect();
        log.sort_by_key(|e| (e.occurred_at, e.id));
        log
    }

    fn append(&mut self, mut event: LoanEvent) -> LoanEvent {
        event.id = self.allocate_id();
        self.loan_events.push(event.clone());
        event
    }
}

fn page<T>(items: impl Iterator<Item = T>, offset: u64, limit: u64) -> Vec<T> {
    items
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect()
}

/// Mock ledger store that keeps every record in memory.
#[derive(Default)]
pub struct MockLedgerStore {
    tables: RwLock<Tables>,
    fail_on_write: RwLock<bool>,
    fail_on_read: RwLock<bool>,
}

impl MockLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Append an event verbatim, bypassing the open-loan check.
    ///
    /// Lets tests seed histories that the ledger itself would never write,
    /// such as pending or cancelled events.
    pub async fn push_raw_event(&self, event: LoanEvent) -> LoanEvent {
        self.tables.write().await.append(event)
    }

    pub async fn loan_event_count(&self) -> usize {
        self.tables.read().await.loan_events.len()
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StorageError::Injected("write"));
        }
        Ok(())
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Injected("read"));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MockLedgerStore {
    async fn insert_textbook(&self, textbook: NewTextbook) -> Result<Textbook> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        if tables.textbooks.values().any(|t| t.code == textbook.code) {
            return Err(StorageError::Duplicate(format!("textbooks.code: {}", textbook.code)));
        }
        let id = tables.allocate_id();
        let record = Textbook {
            id,
            current_condition: textbook.initial_condition.clone(),
            code: textbook.code,
            subject: textbook.subject,
            title: textbook.title,
            author: textbook.author,
            publisher: textbook.publisher,
            year: textbook.year,
            isbn: textbook.isbn,
            inventory_number: textbook.inventory_number,
            initial_condition: textbook.initial_condition,
            is_active: true,
            created_at: textbook.created_at,
            updated_at: None,
        };
        tables.textbooks.insert(id, record.clone());
        Ok(record)
    }

    async fn get_textbook(&self, id: TextbookId) -> Result<Option<Textbook>> {
        self.check_read().await?;
        Ok(self.tables.read().await.textbooks.get(&id).cloned())
    }

    async fn find_textbook_by_code(&self, code: &str) -> Result<Option<Textbook>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables.textbooks.values().find(|t| t.code == code).cloned())
    }

    async fn list_textbooks(&self, filter: &TextbookFilter) -> Result<Vec<Textbook>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(page(
            tables.textbooks.values().filter(|t| filter.matches(t)).cloned(),
            filter.offset,
            filter.limit,
        ))
    }

    async fn update_textbook_condition(
        &self,
        id: TextbookId,
        condition: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Textbook>> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        Ok(tables.textbooks.get_mut(&id).map(|t| {
            t.current_condition = Some(condition.to_string());
            t.updated_at = Some(at);
            t.clone()
        }))
    }

    async fn set_textbook_active(
        &self,
        id: TextbookId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Textbook>> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        Ok(tables.textbooks.get_mut(&id).map(|t| {
            t.is_active = active;
            t.updated_at = Some(at);
            t.clone()
        }))
    }

    async fn insert_student(&self, student: NewStudent) -> Result<Student> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let id = tables.allocate_id();
        let record = Student {
            id,
            first_name: student.first_name,
            last_name: student.last_name,
            middle_name: student.middle_name,
            grade: student.grade,
            phone: student.phone,
            parent_phone: student.parent_phone,
            messenger_id: None,
            is_active: true,
            created_at: student.created_at,
            updated_at: None,
        };
        tables.students.insert(id, record.clone());
        Ok(record)
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        self.check_read().await?;
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn list_students(&self, grade: Option<&str>, active_only: bool) -> Result<Vec<Student>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        let mut students: Vec<Student> = tables
            .students
            .values()
            .filter(|s| grade.is_none_or(|g| s.grade == g))
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        students.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(students)
    }

    async fn set_student_active(
        &self,
        id: StudentId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Student>> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        Ok(tables.students.get_mut(&id).map(|s| {
            s.is_active = active;
            s.updated_at = Some(at);
            s.clone()
        }))
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::Duplicate(format!("users.username: {}", user.username)));
        }
        if let Some(student_id) = user.student_id {
            if tables.users.values().any(|u| u.student_id == Some(student_id)) {
                return Err(StorageError::Duplicate(format!("users.student_id: {}", student_id)));
            }
        }
        let id = tables.allocate_id();
        let record = User {
            id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: true,
            student_id: user.student_id,
            created_at: user.created_at,
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.check_read().await?;
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_student(&self, student_id: StudentId) -> Result<Option<User>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.student_id == Some(student_id))
            .cloned())
    }

    async fn loan_events_for_textbook(&self, textbook_id: TextbookId) -> Result<Vec<LoanEvent>> {
        self.check_read().await?;
        Ok(self.tables.read().await.textbook_log(textbook_id))
    }

    async fn loan_events_for_student(&self, student_id: StudentId) -> Result<Vec<LoanEvent>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        let mut log: Vec<LoanEvent> = tables
            .loan_events
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect();
        log.sort_by_key(|e| (e.occurred_at, e.id));
        Ok(log)
    }

    async fn list_loan_events(&self, filter: &LoanFilter) -> Result<Vec<LoanEvent>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        let mut matching: Vec<LoanEvent> = tables
            .loan_events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by_key(|e| (e.occurred_at, e.id));
        Ok(page(matching.into_iter(), filter.offset, filter.limit))
    }

    async fn issue_if_available(&self, mut draft: IssueDraft) -> Result<IssueOutcome> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let log = tables.textbook_log(draft.textbook_id);
        if let Some(open) = open_loan(&log) {
            return Ok(IssueOutcome::AlreadyOnLoan(open.clone()));
        }
        draft.occurred_at = issue_timestamp(&log, draft.occurred_at);
        Ok(IssueOutcome::Issued(tables.append(draft.into_event())))
    }

    async fn return_if_on_loan(&self, draft: ReturnDraft) -> Result<ReturnOutcome> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let log = tables.textbook_log(draft.textbook_id);
        let Some(issue) = open_loan(&log).cloned() else {
            return Ok(ReturnOutcome::NotOnLoan);
        };
        let event = tables.append(draft.into_event(issue.student_id));
        Ok(ReturnOutcome::Returned { issue, event })
    }

    async fn insert_damage_report(&self, report: NewDamageReport) -> Result<DamageReport> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let record = DamageReport {
            id: tables.allocate_id(),
            textbook_id: report.textbook_id,
            student_id: report.student_id,
            reporter_id: report.reporter_id,
            reporter_role: report.reporter_role,
            category: report.category,
            description: report.description,
            evidence: report.evidence,
            is_during_check_period: report.is_during_check_period,
            status: ReviewStatus::Pending,
            decision: None,
            checked_by: None,
            checked_at: None,
            reported_at: report.reported_at,
        };
        tables.damage_reports.push(record.clone());
        Ok(record)
    }

    async fn get_damage_report(&self, id: DamageReportId) -> Result<Option<DamageReport>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables.damage_reports.iter().find(|r| r.id == id).cloned())
    }

    async fn list_damage_reports(&self, filter: &DamageFilter) -> Result<Vec<DamageReport>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        let mut matching: Vec<DamageReport> = tables
            .damage_reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.reported_at, r.id));
        Ok(page(matching.into_iter(), filter.offset, filter.limit))
    }

    async fn check_damage_report(
        &self,
        id: DamageReportId,
        decision: DamageDecision,
    ) -> Result<Option<Transition<DamageReport>>> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let Some(report) = tables.damage_reports.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if report.status == ReviewStatus::Checked {
            return Ok(Some(Transition::AlreadyFinal(report.clone())));
        }
        report.status = ReviewStatus::Checked;
        report.decision = Some(decision.decision);
        report.checked_by = Some(decision.checked_by);
        report.checked_at = Some(decision.checked_at);
        Ok(Some(Transition::Applied(report.clone())))
    }

    async fn insert_found_report(&self, report: NewFoundReport) -> Result<FoundReport> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let record = FoundReport {
            id: tables.allocate_id(),
            textbook_id: report.textbook_id,
            found_location: report.found_location,
            description: report.description,
            evidence: report.evidence,
            status: FoundStatus::Found,
            notes: None,
            reported_by: report.reported_by,
            returned_by: None,
            found_at: report.found_at,
            returned_at: None,
        };
        tables.found_reports.push(record.clone());
        Ok(record)
    }

    async fn get_found_report(&self, id: FoundReportId) -> Result<Option<FoundReport>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables.found_reports.iter().find(|r| r.id == id).cloned())
    }

    async fn list_found_reports(&self, filter: &FoundFilter) -> Result<Vec<FoundReport>> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        let mut matching: Vec<FoundReport> = tables
            .found_reports
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.found_at, r.id));
        Ok(page(matching.into_iter(), filter.offset, filter.limit))
    }

    async fn mark_found_returned(
        &self,
        id: FoundReportId,
        resolution: FoundResolution,
    ) -> Result<Option<Transition<FoundReport>>> {
        self.check_write().await?;
        let mut tables = self.tables.write().await;
        let Some(report) = tables.found_reports.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if report.status == FoundStatus::Returned {
            return Ok(Some(Transition::AlreadyFinal(report.clone())));
        }
        report.status = FoundStatus::Returned;
        report.returned_by = Some(resolution.returned_by);
        report.returned_at = Some(resolution.returned_at);
        report.notes = resolution.notes;
        Ok(Some(Transition::Applied(report.clone())))
    }
}
