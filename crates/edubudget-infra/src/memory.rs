//! In-memory store implementing every repository port.
//!
//! For embedders and tests that do not need SQLite. Uses `DashMap` for
//! concurrent access without a global lock. The usage increment holds the
//! entry's shard lock for the read-modify-write, so it is atomic per account.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use edubudget_core::repository::account::{AccountFilter, AccountRepository};
use edubudget_core::repository::ledger::UsageLedgerRepository;
use edubudget_core::repository::student::StudentRepository;
use edubudget_types::account::{Account, AccountId, TokenUsage};
use edubudget_types::error::RepositoryError;
use edubudget_types::student::{StudentId, StudentRecord};
use edubudget_types::usage::UsageEvent;

#[derive(Default)]
pub struct InMemoryStore {
    accounts: DashMap<AccountId, Account>,
    students: DashMap<StudentId, StudentRecord>,
    events: DashMap<Uuid, UsageEvent>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn events_where(&self, pred: impl Fn(&UsageEvent) -> bool) -> Vec<UsageEvent> {
        let mut events: Vec<UsageEvent> = self
            .events
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect();
        events.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        events
    }
}

fn oldest_first(mut accounts: Vec<Account>) -> Vec<Account> {
    accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
    accounts
}

impl AccountRepository for InMemoryStore {
    async fn create(&self, account: &Account) -> Result<Account, RepositoryError> {
        let account = account.clone().normalized();

        if let Some(parent) = &account.parent_admin_id {
            let parent_is_admin = self.accounts.get(parent).is_some_and(|p| p.is_admin());
            if !parent_is_admin {
                return Err(RepositoryError::Conflict(
                    "parent admin does not exist".to_string(),
                ));
            }
        }

        match self.accounts.entry(account.id.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "account '{}' already exists",
                account.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    async fn get_by_id(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.get(id).map(|a| a.value().clone()))
    }

    async fn list(&self, filter: Option<AccountFilter>) -> Result<Vec<Account>, RepositoryError> {
        let filter = filter.unwrap_or_default();
        let accounts = self
            .accounts
            .iter()
            .filter(|a| filter.role.is_none_or(|r| a.role == r))
            .filter(|a| {
                filter
                    .parent_admin_id
                    .as_ref()
                    .is_none_or(|p| a.parent_admin_id.as_ref() == Some(p))
            })
            .map(|a| a.value().clone())
            .collect();
        Ok(oldest_first(accounts))
    }

    async fn list_teachers_of(&self, admin_id: &AccountId) -> Result<Vec<Account>, RepositoryError> {
        let teachers = self
            .accounts
            .iter()
            .filter(|a| a.is_teacher() && a.parent_admin_id.as_ref() == Some(admin_id))
            .map(|a| a.value().clone())
            .collect();
        Ok(oldest_first(teachers))
    }

    async fn update(&self, account: &Account) -> Result<Account, RepositoryError> {
        let mut stored = self
            .accounts
            .get_mut(&account.id)
            .ok_or(RepositoryError::NotFound)?;
        let incoming = account.clone().normalized();

        stored.name = incoming.name;
        stored.email = incoming.email;
        stored.token_usage.limit = incoming.token_usage.limit;
        stored.updated_at = incoming.updated_at;
        Ok(stored.clone())
    }

    async fn increment_used(&self, id: &AccountId, tokens: u64) -> Result<TokenUsage, RepositoryError> {
        let mut stored = self.accounts.get_mut(id).ok_or(RepositoryError::NotFound)?;
        stored.token_usage.used = stored
            .token_usage
            .used
            .checked_add(tokens)
            .ok_or_else(|| RepositoryError::Overflow(format!("adding {tokens} to account '{id}'")))?;
        stored.updated_at = Utc::now();
        Ok(stored.token_usage)
    }

    async fn delete(&self, id: &AccountId) -> Result<(), RepositoryError> {
        let (_, removed) = self.accounts.remove(id).ok_or(RepositoryError::NotFound)?;

        if removed.is_admin() {
            self.accounts
                .retain(|_, a| a.parent_admin_id.as_ref() != Some(id));
            self.students.retain(|_, s| &s.admin_id != id);
        }
        Ok(())
    }
}

impl StudentRepository for InMemoryStore {
    async fn create(&self, student: &StudentRecord) -> Result<StudentRecord, RepositoryError> {
        let admin_exists = self
            .accounts
            .get(&student.admin_id)
            .is_some_and(|a| a.is_admin());
        if !admin_exists {
            return Err(RepositoryError::Conflict(format!(
                "admin '{}' does not exist",
                student.admin_id
            )));
        }

        self.students.insert(student.id.clone(), student.clone());
        Ok(student.clone())
    }

    async fn get_by_id(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        Ok(self.students.get(id).map(|s| s.value().clone()))
    }

    async fn list_by_admin(&self, admin_id: &AccountId) -> Result<Vec<StudentRecord>, RepositoryError> {
        let mut students: Vec<StudentRecord> = self
            .students
            .iter()
            .filter(|s| &s.admin_id == admin_id)
            .map(|s| s.value().clone())
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.0.cmp(&b.id.0)));
        Ok(students)
    }

    async fn delete(&self, id: &StudentId) -> Result<(), RepositoryError> {
        self.students
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl UsageLedgerRepository for InMemoryStore {
    async fn append(&self, event: &UsageEvent) -> Result<(), RepositoryError> {
        self.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn students_total(&self, admin_id: &AccountId) -> Result<u64, RepositoryError> {
        Ok(self
            .events
            .iter()
            .filter(|e| &e.admin_id == admin_id)
            .filter(|e| {
                e.student_id
                    .as_ref()
                    .and_then(|id| self.students.get(id))
                    .is_some_and(|s| &s.admin_id == admin_id)
            })
            .fold(0, |total, e| total.saturating_add(e.cost.total_tokens)))
    }

    async fn list_for_student(&self, student_id: &StudentId) -> Result<Vec<UsageEvent>, RepositoryError> {
        Ok(self.events_where(|e| e.student_id.as_ref() == Some(student_id)))
    }

    async fn list_for_admin(&self, admin_id: &AccountId) -> Result<Vec<UsageEvent>, RepositoryError> {
        Ok(self.events_where(|e| &e.admin_id == admin_id))
    }
}
