//! SQLite LedgerStore implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Asterisk, Expr, Order, Query, SelectStatement, SqliteQueryBuilder};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::rows;
use crate::interfaces::ledger_store::{LedgerStore, Result, StorageError};
use crate::ledger::reconcile::{issue_timestamp, open_loan};
use crate::model::{
    DamageDecision, DamageFilter, DamageReport, DamageReportId, FoundFilter, FoundReport,
    FoundReportId, FoundResolution, FoundStatus, IssueDraft, IssueOutcome, LoanEvent, LoanFilter,
    NewDamageReport, NewFoundReport, NewStudent, NewTextbook, NewUser,
    ReturnDraft, ReturnOutcome, ReviewStatus, Student, StudentId, Textbook, TextbookFilter,
    TextbookId, Transition, User, UserId,
};
use crate::storage::helpers::{encode_evidence, format_timestamp};
use crate::storage::schema::{
    DamageReports, FoundReports, LoanEvents, Students, Textbooks, Users, CREATE_TABLES,
};

/// Largest LIMIT SQLite accepts.
const SQLITE_MAX_LIMIT: u64 = i64::MAX as u64;

fn paginate(query: &mut SelectStatement, offset: u64, limit: u64) {
    if offset > 0 || limit < SQLITE_MAX_LIMIT {
        query.limit(limit.min(SQLITE_MAX_LIMIT)).offset(offset);
    }
}

/// SQLite implementation of LedgerStore.
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Create a new SQLite ledger store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist.
    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_TABLES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Ledger schema initialized");
        Ok(())
    }

    async fn textbook_events(
        conn: &mut SqliteConnection,
        textbook_id: TextbookId,
    ) -> Result<Vec<LoanEvent>> {
        let query = Query::select()
            .column(Asterisk)
            .from(LoanEvents::Table)
            .and_where(Expr::col(LoanEvents::TextbookId).eq(textbook_id))
            .order_by(LoanEvents::OccurredAt, Order::Asc)
            .order_by(LoanEvents::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let found = sqlx::query(&query).fetch_all(&mut *conn).await?;
        found.iter().map(rows::loan_event).collect()
    }

    /// Insert a completed event; the `id` of `event` is ignored and replaced.
    async fn append_event(conn: &mut SqliteConnection, mut event: LoanEvent) -> Result<LoanEvent> {
        let query = Query::insert()
            .into_table(LoanEvents::Table)
            .columns([
                LoanEvents::TextbookId,
                LoanEvents::StudentId,
                LoanEvents::Kind,
                LoanEvents::Status,
                LoanEvents::OccurredAt,
                LoanEvents::ActorId,
                LoanEvents::Evidence,
                LoanEvents::Notes,
                LoanEvents::ReturnedAt,
            ])
            .values_panic([
                event.textbook_id.into(),
                event.student_id.into(),
                event.kind.as_str().into(),
                event.status.as_str().into(),
                format_timestamp(event.occurred_at).into(),
                event.actor_id.into(),
                encode_evidence(&event.evidence)?.into(),
                event.notes.clone().into(),
                event.returned_at.map(format_timestamp).into(),
            ])
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query).execute(&mut *conn).await?;
        event.id = done.last_insert_rowid();
        Ok(event)
    }

    async fn issue_within(
        conn: &mut SqliteConnection,
        mut draft: IssueDraft,
    ) -> Result<IssueOutcome> {
        let events = Self::textbook_events(conn, draft.textbook_id).await?;
        if let Some(open) = open_loan(&events) {
            return Ok(IssueOutcome::AlreadyOnLoan(open.clone()));
        }
        draft.occurred_at = issue_timestamp(&events, draft.occurred_at);

        let event = Self::append_event(conn, draft.into_event()).await?;
        Ok(IssueOutcome::Issued(event))
    }

    async fn return_within(
        conn: &mut SqliteConnection,
        draft: ReturnDraft,
    ) -> Result<ReturnOutcome> {
        let events = Self::textbook_events(conn, draft.textbook_id).await?;
        let Some(issue) = open_loan(&events).cloned() else {
            return Ok(ReturnOutcome::NotOnLoan);
        };

        let event = Self::append_event(conn, draft.into_event(issue.student_id)).await?;
        Ok(ReturnOutcome::Returned { issue, event })
    }

    async fn fetch_one<T>(
        &self,
        query: String,
        decode: fn(&sqlx::sqlite::SqliteRow) -> Result<T>,
    ) -> Result<Option<T>> {
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(decode).transpose()
    }

    async fn fetch_all<T>(
        &self,
        query: String,
        decode: fn(&sqlx::sqlite::SqliteRow) -> Result<T>,
    ) -> Result<Vec<T>> {
        let found = sqlx::query(&query).fetch_all(&self.pool).await?;
        found.iter().map(decode).collect()
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn insert_textbook(&self, textbook: NewTextbook) -> Result<Textbook> {
        let query = Query::insert()
            .into_table(Textbooks::Table)
            .columns([
                Textbooks::Code,
                Textbooks::Subject,
                Textbooks::Title,
                Textbooks::Author,
                Textbooks::Publisher,
                Textbooks::Year,
                Textbooks::Isbn,
                Textbooks::InventoryNumber,
                Textbooks::InitialCondition,
                Textbooks::CurrentCondition,
                Textbooks::IsActive,
                Textbooks::CreatedAt,
            ])
            .values_panic([
                textbook.code.clone().into(),
                textbook.subject.clone().into(),
                textbook.title.clone().into(),
                textbook.author.clone().into(),
                textbook.publisher.clone().into(),
                textbook.year.into(),
                textbook.isbn.clone().into(),
                textbook.inventory_number.clone().into(),
                textbook.initial_condition.clone().into(),
                textbook.initial_condition.clone().into(),
                true.into(),
                format_timestamp(textbook.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(Textbook {
            id: done.last_insert_rowid(),
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
        })
    }

    async fn get_textbook(&self, id: TextbookId) -> Result<Option<Textbook>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Textbooks::Table)
            .and_where(Expr::col(Textbooks::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::textbook).await
    }

    async fn find_textbook_by_code(&self, code: &str) -> Result<Option<Textbook>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Textbooks::Table)
            .and_where(Expr::col(Textbooks::Code).eq(code))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::textbook).await
    }

    async fn list_textbooks(&self, filter: &TextbookFilter) -> Result<Vec<Textbook>> {
        let sql = {
            let mut query = Query::select();
            query
                .column(Asterisk)
                .from(Textbooks::Table)
                .order_by(Textbooks::Id, Order::Asc);
            if let Some(subject) = &filter.subject {
                query.and_where(Expr::col(Textbooks::Subject).like(format!("%{}%", subject)));
            }
            if let Some(active) = filter.is_active {
                query.and_where(Expr::col(Textbooks::IsActive).eq(active));
            }
            paginate(&mut query, filter.offset, filter.limit);
            query.to_string(SqliteQueryBuilder)
        };
        self.fetch_all(sql, rows::textbook).await
    }

    async fn update_textbook_condition(
        &self,
        id: TextbookId,
        condition: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Textbook>> {
        let query = Query::update()
            .table(Textbooks::Table)
            .value(Textbooks::CurrentCondition, condition)
            .value(Textbooks::UpdatedAt, format_timestamp(at))
            .and_where(Expr::col(Textbooks::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&self.pool).await?;
        self.get_textbook(id).await
    }

    async fn set_textbook_active(
        &self,
        id: TextbookId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Textbook>> {
        let query = Query::update()
            .table(Textbooks::Table)
            .value(Textbooks::IsActive, active)
            .value(Textbooks::UpdatedAt, format_timestamp(at))
            .and_where(Expr::col(Textbooks::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&self.pool).await?;
        self.get_textbook(id).await
    }

    async fn insert_student(&self, student: NewStudent) -> Result<Student> {
        let query = Query::insert()
            .into_table(Students::Table)
            .columns([
                Students::FirstName,
                Students::LastName,
                Students::MiddleName,
                Students::Grade,
                Students::Phone,
                Students::ParentPhone,
                Students::IsActive,
                Students::CreatedAt,
            ])
            .values_panic([
                student.first_name.clone().into(),
                student.last_name.clone().into(),
                student.middle_name.clone().into(),
                student.grade.clone().into(),
                student.phone.clone().into(),
                student.parent_phone.clone().into(),
                true.into(),
                format_timestamp(student.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(Student {
            id: done.last_insert_rowid(),
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
        })
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Students::Table)
            .and_where(Expr::col(Students::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::student).await
    }

    async fn list_students(&self, grade: Option<&str>, active_only: bool) -> Result<Vec<Student>> {
        let sql = {
            let mut query = Query::select();
            query
                .column(Asterisk)
                .from(Students::Table)
                .order_by(Students::LastName, Order::Asc)
                .order_by(Students::FirstName, Order::Asc)
                .order_by(Students::Id, Order::Asc);
            if let Some(grade) = grade {
                query.and_where(Expr::col(Students::Grade).eq(grade));
            }
            if active_only {
                query.and_where(Expr::col(Students::IsActive).eq(true));
            }
            query.to_string(SqliteQueryBuilder)
        };
        self.fetch_all(sql, rows::student).await
    }

    async fn set_student_active(
        &self,
        id: StudentId,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Student>> {
        let query = Query::update()
            .table(Students::Table)
            .value(Students::IsActive, active)
            .value(Students::UpdatedAt, format_timestamp(at))
            .and_where(Expr::col(Students::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&self.pool).await?;
        self.get_student(id).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let query = Query::insert()
            .into_table(Users::Table)
            .columns([
                Users::Username,
                Users::Email,
                Users::Role,
                Users::IsActive,
                Users::StudentId,
                Users::CreatedAt,
            ])
            .values_panic([
                user.username.clone().into(),
                user.email.clone().into(),
                user.role.as_str().into(),
                true.into(),
                user.student_id.into(),
                format_timestamp(user.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(User {
            id: done.last_insert_rowid(),
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: true,
            student_id: user.student_id,
            created_at: user.created_at,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Users::Table)
            .and_where(Expr::col(Users::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::user).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Users::Table)
            .and_where(Expr::col(Users::Username).eq(username))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::user).await
    }

    async fn find_user_by_student(&self, student_id: StudentId) -> Result<Option<User>> {
        let query = Query::select()
            .column(Asterisk)
            .from(Users::Table)
            .and_where(Expr::col(Users::StudentId).eq(student_id))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::user).await
    }

    async fn loan_events_for_textbook(&self, textbook_id: TextbookId) -> Result<Vec<LoanEvent>> {
        let mut conn = self.pool.acquire().await?;
        Self::textbook_events(&mut conn, textbook_id).await
    }

    async fn loan_events_for_student(&self, student_id: StudentId) -> Result<Vec<LoanEvent>> {
        let query = Query::select()
            .column(Asterisk)
            .from(LoanEvents::Table)
            .and_where(Expr::col(LoanEvents::StudentId).eq(student_id))
            .order_by(LoanEvents::OccurredAt, Order::Asc)
            .order_by(LoanEvents::Id, Order::Asc)
            .to_string(SqliteQueryBuilder);
        self.fetch_all(query, rows::loan_event).await
    }

    async fn list_loan_events(&self, filter: &LoanFilter) -> Result<Vec<LoanEvent>> {
        let sql = {
            let mut query = Query::select();
            query
                .column(Asterisk)
                .from(LoanEvents::Table)
                .order_by(LoanEvents::OccurredAt, Order::Asc)
                .order_by(LoanEvents::Id, Order::Asc);
            if let Some(id) = filter.textbook_id {
                query.and_where(Expr::col(LoanEvents::TextbookId).eq(id));
            }
            if let Some(id) = filter.student_id {
                query.and_where(Expr::col(LoanEvents::StudentId).eq(id));
            }
            if let Some(kind) = filter.kind {
                query.and_where(Expr::col(LoanEvents::Kind).eq(kind.as_str()));
            }
            if let Some(status) = filter.status {
                query.and_where(Expr::col(LoanEvents::Status).eq(status.as_str()));
            }
            if let Some(since) = filter.since {
                query.and_where(Expr::col(LoanEvents::OccurredAt).gte(format_timestamp(since)));
            }
            if let Some(until) = filter.until {
                query.and_where(Expr::col(LoanEvents::OccurredAt).lte(format_timestamp(until)));
            }
            paginate(&mut query, filter.offset, filter.limit);
            query.to_string(SqliteQueryBuilder)
        };
        self.fetch_all(sql, rows::loan_event).await
    }

    async fn issue_if_available(&self, draft: IssueDraft) -> Result<IssueOutcome> {
        // BEGIN IMMEDIATE takes the write lock before the open-loan read, so a
        // concurrent issue for the same textbook waits and then sees our row.
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::issue_within(&mut conn, draft).await;

        match result {
            Ok(outcome) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(outcome)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn return_if_on_loan(&self, draft: ReturnDraft) -> Result<ReturnOutcome> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result = Self::return_within(&mut conn, draft).await;

        match result {
            Ok(outcome) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(outcome)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    async fn insert_damage_report(&self, report: NewDamageReport) -> Result<DamageReport> {
        let query = Query::insert()
            .into_table(DamageReports::Table)
            .columns([
                DamageReports::TextbookId,
                DamageReports::StudentId,
                DamageReports::ReporterId,
                DamageReports::ReporterRole,
                DamageReports::Category,
                DamageReports::Description,
                DamageReports::Evidence,
                DamageReports::IsDuringCheckPeriod,
                DamageReports::Status,
                DamageReports::ReportedAt,
            ])
            .values_panic([
                report.textbook_id.into(),
                report.student_id.into(),
                report.reporter_id.into(),
                report.reporter_role.as_str().into(),
                report.category.as_str().into(),
                report.description.clone().into(),
                encode_evidence(&report.evidence)?.into(),
                report.is_during_check_period.into(),
                ReviewStatus::Pending.as_str().into(),
                format_timestamp(report.reported_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query).execute(&self.pool).await?;

        Ok(DamageReport {
            id: done.last_insert_rowid(),
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
        })
    }

    async fn get_damage_report(&self, id: DamageReportId) -> Result<Option<DamageReport>> {
        let query = Query::select()
            .column(Asterisk)
            .from(DamageReports::Table)
            .and_where(Expr::col(DamageReports::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::damage_report).await
    }

    async fn list_damage_reports(&self, filter: &DamageFilter) -> Result<Vec<DamageReport>> {
        let sql = {
            let mut query = Query::select();
            query
                .column(Asterisk)
                .from(DamageReports::Table)
                .order_by(DamageReports::ReportedAt, Order::Asc)
                .order_by(DamageReports::Id, Order::Asc);
            if let Some(id) = filter.textbook_id {
                query.and_where(Expr::col(DamageReports::TextbookId).eq(id));
            }
            if let Some(category) = filter.category {
                query.and_where(Expr::col(DamageReports::Category).eq(category.as_str()));
            }
            if let Some(status) = filter.status {
                query.and_where(Expr::col(DamageReports::Status).eq(status.as_str()));
            }
            paginate(&mut query, filter.offset, filter.limit);
            query.to_string(SqliteQueryBuilder)
        };
        self.fetch_all(sql, rows::damage_report).await
    }

    async fn check_damage_report(
        &self,
        id: DamageReportId,
        decision: DamageDecision,
    ) -> Result<Option<Transition<DamageReport>>> {
        // Conditional on the pending status; a second reviewer updates nothing.
        let query = Query::update()
            .table(DamageReports::Table)
            .value(DamageReports::Status, ReviewStatus::Checked.as_str())
            .value(DamageReports::Decision, decision.decision)
            .value(DamageReports::CheckedBy, decision.checked_by)
            .value(DamageReports::CheckedAt, format_timestamp(decision.checked_at))
            .and_where(Expr::col(DamageReports::Id).eq(id))
            .and_where(Expr::col(DamageReports::Status).eq(ReviewStatus::Pending.as_str()))
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query).execute(&self.pool).await?;
        let applied = done.rows_affected() == 1;

        Ok(self.get_damage_report(id).await?.map(|report| {
            if applied {
                Transition::Applied(report)
            } else {
                Transition::AlreadyFinal(report)
            }
        }))
    }

    async fn insert_found_report(&self, report: NewFoundReport) -> Result<FoundReport> {
        let query = Query::insert()
            .into_table(FoundReports::Table)
            .columns([
                FoundReports::TextbookId,
                FoundReports::FoundLocation,
                FoundReports::Description,
                FoundReports::Evidence,
                FoundReports::Status,
                FoundReports::ReportedBy,
                FoundReports::FoundAt,
            ])
            .values_panic([
                report.textbook_id.into(),
                report.found_location.clone().into(),
                report.description.clone().into(),
                encode_evidence(&report.evidence)?.into(),
                FoundStatus::Found.as_str().into(),
                report.reported_by.into(),
                format_timestamp(report.found_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query).execute(&self.pool).await?;

        Ok(FoundReport {
            id: done.last_insert_rowid(),
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
        })
    }

    async fn get_found_report(&self, id: FoundReportId) -> Result<Option<FoundReport>> {
        let query = Query::select()
            .column(Asterisk)
            .from(FoundReports::Table)
            .and_where(Expr::col(FoundReports::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        self.fetch_one(query, rows::found_report).await
    }

    async fn list_found_reports(&self, filter: &FoundFilter) -> Result<Vec<FoundReport>> {
        let sql = {
            let mut query = Query::select();
            query
                .column(Asterisk)
                .from(FoundReports::Table)
                .order_by(FoundReports::FoundAt, Order::Asc)
                .order_by(FoundReports::Id, Order::Asc);
            if let Some(id) = filter.textbook_id {
                query.and_where(Expr::col(FoundReports::TextbookId).eq(id));
            }
            if let Some(status) = filter.status {
                query.and_where(Expr::col(FoundReports::Status).eq(status.as_str()));
            }
            paginate(&mut query, filter.offset, filter.limit);
            query.to_string(SqliteQueryBuilder)
        };
        self.fetch_all(sql, rows::found_report).await
    }

    async fn mark_found_returned(
        &self,
        id: FoundReportId,
        resolution: FoundResolution,
    ) -> Result<Option<Transition<FoundReport>>> {
        let query = Query::update()
            .table(FoundReports::Table)
            .value(FoundReports::Status, FoundStatus::Returned.as_str())
            .value(FoundReports::ReturnedBy, resolution.returned_by)
            .value(FoundReports::ReturnedAt, format_timestamp(resolution.returned_at))
            .value(FoundReports::Notes, resolution.notes)
            .and_where(Expr::col(FoundReports::Id).eq(id))
            .and_where(Expr::col(FoundReports::Status).eq(FoundStatus::Found.as_str()))
            .to_string(SqliteQueryBuilder);

        let done = sqlx::query(&query).execute(&self.pool).await?;
        let applied = done.rows_affected() == 1;

        Ok(self.get_found_report(id).await?.map(|report| {
            if applied {
                Transition::Applied(report)
            } else {
                Transition::AlreadyFinal(report)
            }
        }))
    }
}
