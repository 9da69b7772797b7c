//! In-process fake implementing every port, for unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use edubudget_types::account::{Account, AccountId, TokenUsage};
use edubudget_types::error::RepositoryError;
use edubudget_types::student::{StudentId, StudentRecord};
use edubudget_types::usage::UsageEvent;

use crate::repository::account::{AccountFilter, AccountRepository};
use crate::repository::ledger::UsageLedgerRepository;
use crate::repository::student::StudentRepository;

#[derive(Default)]
pub struct FakeStore {
    accounts: Mutex<HashMap<AccountId, Account>>,
    students: Mutex<HashMap<StudentId, StudentRecord>>,
    events: Mutex<Vec<UsageEvent>>,
    fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent write fail with a query error.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk full".to_string()));
        }
        Ok(())
    }

    /// Insert an admin with preset counters.
    pub fn seed_admin(&self, used: u64, limit: u64) -> AccountId {
        let mut admin = Account::new_admin("Admin", None, limit);
        admin.token_usage.used = used;
        let id = admin.id.clone();
        self.accounts.lock().unwrap().insert(id.clone(), admin);
        id
    }

    /// Insert a teacher under `admin_id` with a preset `used` counter.
    pub fn seed_teacher(&self, admin_id: &AccountId, used: u64) -> AccountId {
        let mut teacher = Account::new_teacher(admin_id.clone(), "Teacher", None);
        teacher.token_usage.used = used;
        let id = teacher.id.clone();
        self.accounts.lock().unwrap().insert(id.clone(), teacher);
        id
    }

    pub fn seed_student(&self, admin_id: &AccountId, name: &str) -> StudentId {
        let student = StudentRecord::new(admin_id.clone(), name, "");
        let id = student.id.clone();
        self.students.lock().unwrap().insert(id.clone(), student);
        id
    }

    pub fn used(&self, id: &AccountId) -> u64 {
        self.accounts.lock().unwrap()[id].token_usage.used
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl AccountRepository for FakeStore {
    async fn create(&self, account: &Account) -> Result<Account, RepositoryError> {
        self.check_writable()?;
        self.accounts
            .lock()
            .unwrap()
            .insert(account.id.clone(), account.clone());
        Ok(account.clone())
    }

    async fn get_by_id(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.lock().unwrap().get(id).cloned())
    }

    async fn list(&self, filter: Option<AccountFilter>) -> Result<Vec<Account>, RepositoryError> {
        let filter = filter.unwrap_or_default();
        let mut accounts: Vec<Account> = self
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| filter.role.is_none_or(|r| a.role == r))
            .filter(|a| {
                filter
                    .parent_admin_id
                    .as_ref()
                    .is_none_or(|p| a.parent_admin_id.as_ref() == Some(p))
            })
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn list_teachers_of(&self, admin_id: &AccountId) -> Result<Vec<Account>, RepositoryError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.is_teacher() && a.parent_admin_id.as_ref() == Some(admin_id))
            .cloned()
            .collect())
    }

    async fn update(&self, account: &Account) -> Result<Account, RepositoryError> {
        self.check_writable()?;
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&account.id) {
            Some(existing) => {
                let used = existing.token_usage.used;
                *existing = account.clone();
                existing.token_usage.used = used;
                Ok(existing.clone())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn increment_used(&self, id: &AccountId, tokens: u64) -> Result<TokenUsage, RepositoryError> {
        self.check_writable()?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.get_mut(id).ok_or(RepositoryError::NotFound)?;
        account.token_usage.used = account
            .token_usage
            .used
            .checked_add(tokens)
            .ok_or_else(|| RepositoryError::Overflow(format!("adding {tokens} to account '{id}'")))?;
        account.updated_at = Utc::now();
        Ok(account.token_usage)
    }

    async fn delete(&self, id: &AccountId) -> Result<(), RepositoryError> {
        self.check_writable()?;
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        accounts.retain(|_, a| a.parent_admin_id.as_ref() != Some(id));
        self.students.lock().unwrap().retain(|_, s| &s.admin_id != id);
        Ok(())
    }
}

impl StudentRepository for FakeStore {
    async fn create(&self, student: &StudentRecord) -> Result<StudentRecord, RepositoryError> {
        self.check_writable()?;
        self.students
            .lock()
            .unwrap()
            .insert(student.id.clone(), student.clone());
        Ok(student.clone())
    }

    async fn get_by_id(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        Ok(self.students.lock().unwrap().get(id).cloned())
    }

    async fn list_by_admin(&self, admin_id: &AccountId) -> Result<Vec<StudentRecord>, RepositoryError> {
        let mut students: Vec<StudentRecord> = self
            .students
            .lock()
            .unwrap()
            .values()
            .filter(|s| &s.admin_id == admin_id)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn delete(&self, id: &StudentId) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.students
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl UsageLedgerRepository for FakeStore {
    async fn append(&self, event: &UsageEvent) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn students_total(&self, admin_id: &AccountId) -> Result<u64, RepositoryError> {
        let students = self.students.lock().unwrap();
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.admin_id == admin_id)
            .filter(|e| {
                e.student_id
                    .as_ref()
                    .and_then(|id| students.get(id))
                    .is_some_and(|s| &s.admin_id == admin_id)
            })
            .fold(0, |total, e| total.saturating_add(e.cost.total_tokens)))
    }

    async fn list_for_student(&self, student_id: &StudentId) -> Result<Vec<UsageEvent>, RepositoryError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.student_id.as_ref() == Some(student_id))
            .cloned()
            .collect())
    }

    async fn list_for_admin(&self, admin_id: &AccountId) -> Result<Vec<UsageEvent>, RepositoryError> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.admin_id == admin_id)
            .cloned()
            .collect())
    }
}
