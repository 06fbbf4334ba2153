//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building.

use sea_query::Iden;

/// Textbooks table schema.
#[derive(Iden, Clone, Copy)]
pub enum Textbooks {
    Table,
    Id,
    Code,
    Subject,
    Title,
    Author,
    Publisher,
    Year,
    Isbn,
    InventoryNumber,
    InitialCondition,
    CurrentCondition,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

/// Students table schema.
#[derive(Iden, Clone, Copy)]
pub enum Students {
    Table,
    Id,
    FirstName,
    LastName,
    MiddleName,
    Grade,
    Phone,
    ParentPhone,
    MessengerId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

/// Users table schema.
#[derive(Iden, Clone, Copy)]
pub enum Users {
    Table,
    Id,
    Username,
    Email,
    Role,
    IsActive,
    StudentId,
    CreatedAt,
}

/// Loan events table schema (append-only).
#[derive(Iden, Clone, Copy)]
pub enum LoanEvents {
    Table,
    Id,
    TextbookId,
    StudentId,
    Kind,
    Status,
    OccurredAt,
    ActorId,
    Evidence,
    Notes,
    ReturnedAt,
}

/// Damage reports table schema.
#[derive(Iden, Clone, Copy)]
pub enum DamageReports {
    Table,
    Id,
    TextbookId,
    StudentId,
    ReporterId,
    ReporterRole,
    Category,
    Description,
    Evidence,
    IsDuringCheckPeriod,
    Status,
    Decision,
    CheckedBy,
    CheckedAt,
    ReportedAt,
}

/// Found reports table schema.
#[derive(Iden, Clone, Copy)]
pub enum FoundReports {
    Table,
    Id,
    TextbookId,
    FoundLocation,
    Description,
    Evidence,
    Status,
    Notes,
    ReportedBy,
    ReturnedBy,
    FoundAt,
    ReturnedAt,
}

/// SQL for creating every ledger table, in dependency order.
///
/// Timestamps are fixed-width RFC 3339 UTC strings so text order equals
/// chronological order.
pub const CREATE_TABLES: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS textbooks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    subject TEXT NOT NULL,
    title TEXT NOT NULL,
    author TEXT,
    publisher TEXT,
    year INTEGER,
    isbn TEXT,
    inventory_number TEXT,
    initial_condition TEXT,
    current_condition TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT
)"#,
    r#"
CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    middle_name TEXT,
    grade TEXT NOT NULL,
    phone TEXT,
    parent_phone TEXT,
    messenger_id TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT
)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_students_grade ON students (grade)"#,
    r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT UNIQUE,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    student_id INTEGER UNIQUE REFERENCES students (id),
    created_at TEXT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS loan_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    textbook_id INTEGER NOT NULL REFERENCES textbooks (id),
    student_id INTEGER NOT NULL REFERENCES students (id),
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    actor_id INTEGER NOT NULL,
    evidence TEXT NOT NULL DEFAULT '[]',
    notes TEXT,
    returned_at TEXT
)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_loan_events_textbook ON loan_events (textbook_id, occurred_at)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_loan_events_student ON loan_events (student_id, occurred_at)"#,
    r#"
CREATE TABLE IF NOT EXISTS damage_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    textbook_id INTEGER NOT NULL REFERENCES textbooks (id),
    student_id INTEGER REFERENCES students (id),
    reporter_id INTEGER NOT NULL,
    reporter_role TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    evidence TEXT NOT NULL DEFAULT '[]',
    is_during_check_period INTEGER,
    status TEXT NOT NULL,
    decision TEXT,
    checked_by INTEGER,
    checked_at TEXT,
    reported_at TEXT NOT NULL
)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_damage_reports_textbook ON damage_reports (textbook_id, reported_at)"#,
    r#"
CREATE TABLE IF NOT EXISTS found_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    textbook_id INTEGER NOT NULL REFERENCES textbooks (id),
    found_location TEXT NOT NULL,
    description TEXT,
    evidence TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL,
    notes TEXT,
    reported_by INTEGER NOT NULL,
    returned_by INTEGER,
    found_at TEXT NOT NULL,
    returned_at TEXT
)"#,
    r#"CREATE INDEX IF NOT EXISTS idx_found_reports_textbook ON found_reports (textbook_id, found_at)"#,
];
