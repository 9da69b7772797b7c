use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::account::AccountId;

/// Unique identifier for a student record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(pub Uuid);

impl StudentId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for StudentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StudentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A student owned by an admin.
///
/// Not a login account. Its token usage comes from the usage ledger and is
/// informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub admin_id: AccountId,
    pub name: String,
    pub course: String,
    pub created_at: DateTime<Utc>,
}

impl StudentRecord {
    pub fn new(admin_id: AccountId, name: impl Into<String>, course: impl Into<String>) -> Self {
        Self {
            id: StudentId::new(),
            admin_id,
            name: name.into(),
            course: course.into(),
            created_at: Utc::now(),
        }
    }
}

/// Request to register a student under an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudentRequest {
    pub name: String,
    #[serde(default)]
    pub course: String,
}
