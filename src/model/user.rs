//! Accounts issued by the identity layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StudentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Teacher,
    Student,
}

text_enum!(UserRole, "user role", {
    Teacher => "teacher",
    Student => "student",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    /// Set for `Student` accounts only.
    pub student_id: Option<StudentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub student_id: Option<StudentId>,
    pub created_at: DateTime<Utc>,
}
