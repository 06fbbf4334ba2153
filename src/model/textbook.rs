//! Physical textbook copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TextbookId;

/// Prefix of generated scannable codes.
pub const CODE_PREFIX: &str = "TEXTBOOK_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Textbook {
    pub id: TextbookId,
    /// Unique scannable code printed on the QR label.
    pub code: String,
    pub subject: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub inventory_number: Option<String>,
    pub initial_condition: Option<String>,
    pub current_condition: Option<String>,
    /// `false` once withdrawn from circulation. Textbooks are never deleted.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Textbook {
    /// "Subject: Title", as shown to parents and staff.
    pub fn label(&self) -> String {
        format!("{}: {}", self.subject, self.title)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTextbook {
    pub code: String,
    pub subject: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub isbn: Option<String>,
    pub inventory_number: Option<String>,
    pub initial_condition: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Generate a fresh scannable code: `TEXTBOOK_` followed by 12 upper-case hex digits.
pub fn generate_code() -> String {
    let simple = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", CODE_PREFIX, simple[..12].to_uppercase())
}

#[derive(Debug, Clone)]
pub struct TextbookFilter {
    /// Case-insensitive substring match on the subject.
    pub subject: Option<String>,
    pub is_active: Option<bool>,
    pub offset: u64,
    pub limit: u64,
}

impl Default for TextbookFilter {
    fn default() -> Self {
        Self {
            subject: None,
            is_active: None,
            offset: 0,
            limit: 100,
        }
    }
}

impl TextbookFilter {
    pub fn matches(&self, textbook: &Textbook) -> bool {
        let subject_ok = self.subject.as_deref().is_none_or(|needle| {
            textbook
                .subject
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        subject_ok && self.is_active.is_none_or(|active| active == textbook.is_active)
    }
}
