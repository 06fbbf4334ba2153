//! Row decoding for the SQLite store.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::interfaces::ledger_store::Result;
use crate::model::{DamageReport, FoundReport, LoanEvent, Student, Textbook, User};
use crate::storage::helpers::{decode_evidence, parse_optional_timestamp, parse_timestamp};

pub(super) fn textbook(row: &SqliteRow) -> Result<Textbook> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Textbook {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        subject: row.try_get("subject")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        publisher: row.try_get("publisher")?,
        year: row.try_get("year")?,
        isbn: row.try_get("isbn")?,
        inventory_number: row.try_get("inventory_number")?,
        initial_condition: row.try_get("initial_condition")?,
        current_condition: row.try_get("current_condition")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_optional_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

pub(super) fn student(row: &SqliteRow) -> Result<Student> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Student {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        middle_name: row.try_get("middle_name")?,
        grade: row.try_get("grade")?,
        phone: row.try_get("phone")?,
        parent_phone: row.try_get("parent_phone")?,
        messenger_id: row.try_get("messenger_id")?,
        is_active: row.try_get("is_active")?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_optional_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

pub(super) fn user(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        role: role.parse()?,
        is_active: row.try_get("is_active")?,
        student_id: row.try_get("student_id")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

pub(super) fn loan_event(row: &SqliteRow) -> Result<LoanEvent> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let occurred_at: String = row.try_get("occurred_at")?;
    let evidence: String = row.try_get("evidence")?;
    Ok(LoanEvent {
        id: row.try_get("id")?,
        textbook_id: row.try_get("textbook_id")?,
        student_id: row.try_get("student_id")?,
        kind: kind.parse()?,
        status: status.parse()?,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
        actor_id: row.try_get("actor_id")?,
        evidence: decode_evidence(&evidence)?,
        notes: row.try_get("notes")?,
        returned_at: parse_optional_timestamp("returned_at", row.try_get("returned_at")?)?,
    })
}

pub(super) fn damage_report(row: &SqliteRow) -> Result<DamageReport> {
    let role: String = row.try_get("reporter_role")?;
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let evidence: String = row.try_get("evidence")?;
    let reported_at: String = row.try_get("reported_at")?;
    Ok(DamageReport {
        id: row.try_get("id")?,
        textbook_id: row.try_get("textbook_id")?,
        student_id: row.try_get("student_id")?,
        reporter_id: row.try_get("reporter_id")?,
        reporter_role: role.parse()?,
        category: category.parse()?,
        description: row.try_get("description")?,
        evidence: decode_evidence(&evidence)?,
        is_during_check_period: row.try_get("is_during_check_period")?,
        status: status.parse()?,
        decision: row.try_get("decision")?,
        checked_by: row.try_get("checked_by")?,
        checked_at: parse_optional_timestamp("checked_at", row.try_get("checked_at")?)?,
        reported_at: parse_timestamp("reported_at", &reported_at)?,
    })
}

pub(super) fn found_report(row: &SqliteRow) -> Result<FoundReport> {
    let status: String = row.try_get("status")?;
    let evidence: String = row.try_get("evidence")?;
    let found_at: String = row.try_get("found_at")?;
    Ok(FoundReport {
        id: row.try_get("id")?,
        textbook_id: row.try_get("textbook_id")?,
        found_location: row.try_get("found_location")?,
        description: row.try_get("description")?,
        evidence: decode_evidence(&evidence)?,
        status: status.parse()?,
        notes: row.try_get("notes")?,
        reported_by: row.try_get("reported_by")?,
        returned_by: row.try_get("returned_by")?,
        found_at: parse_timestamp("found_at", &found_at)?,
        returned_at: parse_optional_timestamp("returned_at", row.try_get("returned_at")?)?,
    })
}
