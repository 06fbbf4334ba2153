//! Student roster entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StudentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    /// Class label, e.g. "7A".
    pub grade: String,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    /// Account id in the messaging bot, once linked.
    pub messenger_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Student {
    /// "Last First Middle".
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.last_name.as_str(), self.first_name.as_str()];
        if let Some(middle) = self.middle_name.as_deref() {
            parts.push(middle);
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub grade: String,
    pub phone: Option<String>,
    pub parent_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}
