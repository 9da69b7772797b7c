use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for an account, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    /// Create a new AccountId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create an AccountId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Login roles.
///
/// Students are not login accounts; they are `StudentRecord`s owned by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Tenant root. Owns the token ceiling.
    Admin,
    /// Scoped to one admin. Borrows the admin's capacity.
    Teacher,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Teacher => write!(f, "teacher"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            other => Err(format!("invalid role: '{other}'")),
        }
    }
}

/// Token counters stored on every account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens charged directly to this account.
    pub used: u64,
    /// Ceiling. Positive for admins, always 0 for teachers.
    pub limit: u64,
}

/// An admin or teacher account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub role: Role,
    /// Owning admin. `Some` for teachers, `None` for admins.
    pub parent_admin_id: Option<AccountId>,
    pub name: String,
    pub email: Option<String>,
    pub token_usage: TokenUsage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh admin account with the given ceiling.
    pub fn new_admin(name: impl Into<String>, email: Option<String>, limit: u64) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            role: Role::Admin,
            parent_admin_id: None,
            name: name.into(),
            email,
            token_usage: TokenUsage { used: 0, limit },
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a fresh teacher account owned by `admin_id`.
    pub fn new_teacher(admin_id: AccountId, name: impl Into<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            role: Role::Teacher,
            parent_admin_id: Some(admin_id),
            name: name.into(),
            email,
            token_usage: TokenUsage::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    /// The admin whose budget this account draws from.
    ///
    /// Returns `None` only for a teacher with a missing parent, which is a
    /// corrupted record.
    pub fn budget_owner(&self) -> Option<&AccountId> {
        match self.role {
            Role::Admin => Some(&self.id),
            Role::Teacher => self.parent_admin_id.as_ref(),
        }
    }

    /// Re-apply role invariants to a record loaded from storage.
    ///
    /// Teachers never carry a ceiling of their own, admins never carry a parent.
    pub fn normalized(mut self) -> Self {
        match self.role {
            Role::Teacher => self.token_usage.limit = 0,
            Role::Admin => self.parent_admin_id = None,
        }
        self
    }
}

/// Request to create an admin. Only `name` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdminRequest {
    pub name: String,
    pub email: Option<String>,
    /// Ceiling override. Falls back to the configured default.
    pub token_limit: Option<u64>,
}

/// Request to create a teacher under an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeacherRequest {
    pub name: String,
    pub email: Option<String>,
}
