//! Librarian and staff writes to the roster and the catalogue.

use tracing::info;

use crate::error::{check_length, LedgerError, Result};
use crate::interfaces::StorageError;
use crate::ledger::Ledger;
use crate::model::textbook::generate_code;
use crate::model::{
    NewStudent, NewTextbook, NewUser, Student, StudentId, Textbook, TextbookId, User, UserRole,
};

/// Largest batch `register_textbooks_bulk` accepts.
pub const MAX_BULK_QUANTITY: u32 = 1000;

/// Catalogue data for a new textbook.
#[derive(Debug, Clone, Default)]
pub struct TextbookDetails {
    pub subject: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub inventory_number: Option<String>,
    pub initial_condition: Option<String>,
}

impl TextbookDetails {
    fn validate(&self) -> Result<()> {
        check_length("subject", &self.subject, 1, 100)?;
        check_length("title", &self.title, 1, 200)?;
        if let Some(condition) = &self.initial_condition {
            check_length("initial_condition", condition, 0, 1000)?;
        }
        if let Some(year) = self.year {
            if !(1900..=2030).contains(&year) {
                return Err(LedgerError::Validation {
                    field: "year",
                    reason: format!("{} is outside 1900..=2030", year),
                });
            }
        }
        if let Some(isbn) = &self.isbn {
            let ok = (10..=17).contains(&isbn.len())
                && isbn.chars().all(|c| c.is_ascii_digit() || c == '-');
            if !ok {
                return Err(LedgerError::Validation {
                    field: "isbn",
                    reason: "expected 10-17 digits and dashes".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Roster data for a new student.
#[derive(Debug, Clone, Default)]
pub struct StudentDetails {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub grade: String,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
}

/// Grade labels are one or two digits and an upper-case letter: "7A", "10B".
fn validate_grade(grade: &str) -> Result<()> {
    let mut chars: Vec<char> = grade.chars().collect();
    let letter = chars.pop();
    let ok = matches!(letter, Some(c) if c.is_uppercase())
        && (1..=2).contains(&chars.len())
        && chars.iter().all(|c| c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(LedgerError::Validation {
            field: "grade",
            reason: format!("{:?} is not a grade label like 7A", grade),
        })
    }
}

fn conflict_on_duplicate(err: StorageError, what: impl Into<String>) -> LedgerError {
    match err {
        StorageError::Duplicate(_) => LedgerError::Conflict(what.into()),
        other => LedgerError::Storage(other),
    }
}

impl Ledger {
    /// Add a textbook to the catalogue. A code is generated when none is given.
    pub async fn register_textbook(
        &self,
        details: TextbookDetails,
        code: Option<String>,
    ) -> Result<Textbook> {
        details.validate()?;
        let code = code
            .map(|c| c.trim().to_string())
            .unwrap_or_else(generate_code);
        check_length("code", &code, 1, 100)?;

        let textbook = self
            .store()
            .insert_textbook(NewTextbook {
                code: code.clone(),
                subject: details.subject.trim().to_string(),
                title: details.title.trim().to_string(),
                author: details.author,
                publisher: details.publisher,
                year: details.year,
                isbn: details.isbn,
                inventory_number: details.inventory_number,
                initial_condition: details.initial_condition,
                created_at: self.now(),
            })
            .await
            .map_err(|e| conflict_on_duplicate(e, format!("textbook code {} is taken", code)))?;

        info!(textbook_id = textbook.id, code = %textbook.code, "Textbook registered");
        Ok(textbook)
    }

    /// Register `quantity` copies of one title, each with its own code.
    ///
    /// With a prefix, copies get inventory numbers `{prefix}0001`, `{prefix}0002`, ...
    pub async fn register_textbooks_bulk(
        &self,
        details: TextbookDetails,
        quantity: u32,
        inventory_prefix: Option<&str>,
    ) -> Result<Vec<Textbook>> {
        if !(1..=MAX_BULK_QUANTITY).contains(&quantity) {
            return Err(LedgerError::Validation {
                field: "quantity",
                reason: format!("must be 1..={}, got {}", MAX_BULK_QUANTITY, quantity),
            });
        }
        if let Some(prefix) = inventory_prefix {
            check_length("inventory_prefix", prefix, 0, 20)?;
        }
        details.validate()?;

        let mut created = Vec::with_capacity(quantity as usize);
        for n in 1..=quantity {
            let copy = TextbookDetails {
                inventory_number: inventory_prefix.map(|p| format!("{}{:04}", p, n)),
                ..details.clone()
            };
            created.push(self.register_textbook(copy, None).await?);
        }

        info!(
            quantity,
            subject = %details.subject,
            title = %details.title,
            "Textbooks registered in bulk"
        );
        Ok(created)
    }

    pub async fn update_condition(&self, textbook_id: TextbookId, condition: &str) -> Result<Textbook> {
        check_length("current_condition", condition, 0, 1000)?;
        let textbook = self
            .store()
            .update_textbook_condition(textbook_id, condition.trim(), self.now())
            .await?
            .ok_or_else(|| LedgerError::not_found("textbook", textbook_id))?;
        info!(textbook_id, "Textbook condition updated");
        Ok(textbook)
    }

    /// Withdraw a textbook from circulation or bring it back.
    ///
    /// A textbook on loan cannot be withdrawn; return it first.
    pub async fn set_textbook_active(&self, textbook_id: TextbookId, active: bool) -> Result<Textbook> {
        self.require_textbook(textbook_id).await?;
        if !active {
            if let Some(issue) = self.is_open_loan(textbook_id).await? {
                return Err(LedgerError::InvalidTransition(format!(
                    "textbook {} is on loan to student {}",
                    textbook_id, issue.student_id
                )));
            }
        }

        let textbook = self
            .store()
            .set_textbook_active(textbook_id, active, self.now())
            .await?
            .ok_or_else(|| LedgerError::not_found("textbook", textbook_id))?;
        info!(textbook_id, active, "Textbook active flag changed");
        Ok(textbook)
    }

    pub async fn enroll_student(&self, details: StudentDetails) -> Result<Student> {
        check_length("first_name", &details.first_name, 1, 50)?;
        check_length("last_name", &details.last_name, 1, 50)?;
        if let Some(middle) = &details.middle_name {
            check_length("middle_name", middle, 0, 50)?;
        }
        validate_grade(details.grade.trim())?;

        let student = self
            .store()
            .insert_student(NewStudent {
                first_name: details.first_name.trim().to_string(),
                last_name: details.last_name.trim().to_string(),
                middle_name: details.middle_name.map(|m| m.trim().to_string()),
                grade: details.grade.trim().to_string(),
                phone: details.phone,
                parent_phone: details.parent_phone,
                created_at: self.now(),
            })
            .await?;

        info!(student_id = student.id, grade = %student.grade, "Student enrolled");
        Ok(student)
    }

    /// Deactivate a student (e.g. transferred out) or reactivate them.
    ///
    /// Their open loans stay open and keep showing up in reports.
    pub async fn set_student_active(&self, student_id: StudentId, active: bool) -> Result<Student> {
        let student = self
            .store()
            .set_student_active(student_id, active, self.now())
            .await?
            .ok_or_else(|| LedgerError::not_found("student", student_id))?;
        info!(student_id, active, "Student active flag changed");
        Ok(student)
    }

    pub async fn create_teacher_account(
        &self,
        username: &str,
        email: Option<String>,
    ) -> Result<User> {
        check_length("username", username, 3, 50)?;
        let username = username.trim().to_string();

        let user = self
            .store()
            .insert_user(NewUser {
                username: username.clone(),
                email,
                role: UserRole::Teacher,
                student_id: None,
                created_at: self.now(),
            })
            .await
            .map_err(|e| conflict_on_duplicate(e, format!("username {} is taken", username)))?;

        info!(user_id = user.id, "Teacher account created");
        Ok(user)
    }

    /// Create the one account a student may have.
    pub async fn create_student_account(&self, student_id: StudentId, username: &str) -> Result<User> {
        check_length("username", username, 3, 50)?;
        let username = username.trim().to_string();
        self.require_student(student_id).await?;

        if self.store().find_user_by_student(student_id).await?.is_some() {
            return Err(LedgerError::Conflict(format!(
                "student {} already has an account",
                student_id
            )));
        }
        if self.store().find_user_by_username(&username).await?.is_some() {
            return Err(LedgerError::Conflict(format!("username {} is taken", username)));
        }

        let user = self
            .store()
            .insert_user(NewUser {
                username: username.clone(),
                email: None,
                role: UserRole::Student,
                student_id: Some(student_id),
                created_at: self.now(),
            })
            .await
            .map_err(|e| {
                conflict_on_duplicate(e, format!("account for student {} already exists", student_id))
            })?;

        info!(user_id = user.id, student_id, "Student account created");
        Ok(user)
    }
}
