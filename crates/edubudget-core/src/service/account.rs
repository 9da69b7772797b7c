//! Account lifecycle service.
//!
//! Creates and removes admins, teachers and student records while keeping the
//! role invariants: a teacher always has an admin parent and never a ceiling
//! of its own, and an admin always has a positive ceiling.

use std::sync::Arc;

use edubudget_types::account::{
    Account, AccountId, CreateAdminRequest, CreateTeacherRequest, Role,
};
use edubudget_types::error::{BudgetError, RepositoryError};
use edubudget_types::student::{CreateStudentRequest, StudentId, StudentRecord};

use crate::budget::{load_account, resolve_owner};
use crate::repository::account::{AccountFilter, AccountRepository};
use crate::repository::student::StudentRepository;

/// Service orchestrating account and student records.
///
/// Generic over repository traits -- edubudget-core never depends on
/// edubudget-infra.
pub struct AccountService<A: AccountRepository, S: StudentRepository> {
    accounts: Arc<A>,
    students: Arc<S>,
    default_admin_limit: u64,
}

impl<A: AccountRepository, S: StudentRepository> AccountService<A, S> {
    /// `default_admin_limit` applies when an admin is created without an
    /// explicit ceiling.
    pub fn new(accounts: Arc<A>, students: Arc<S>, default_admin_limit: u64) -> Self {
        Self {
            accounts,
            students,
            default_admin_limit,
        }
    }

    pub fn default_admin_limit(&self) -> u64 {
        self.default_admin_limit
    }

    pub async fn create_admin(&self, request: CreateAdminRequest) -> Result<Account, BudgetError> {
        let name = validate_name(&request.name)?;
        let limit = request.token_limit.unwrap_or(self.default_admin_limit);
        validate_limit(limit)?;

        let admin = Account::new_admin(name, normalize_email(request.email), limit);
        let admin = self.accounts.create(&admin).await.map_err(map_conflict)?;

        tracing::info!(admin_id = %admin.id, limit, "created admin");
        Ok(admin)
    }

    /// Create a teacher under `admin_id`. The parent must be an admin.
    pub async fn create_teacher(
        &self,
        admin_id: &AccountId,
        request: CreateTeacherRequest,
    ) -> Result<Account, BudgetError> {
        let name = validate_name(&request.name)?;
        self.require_admin(admin_id).await?;

        let teacher = Account::new_teacher(admin_id.clone(), name, normalize_email(request.email));
        let teacher = self.accounts.create(&teacher).await.map_err(map_conflict)?;

        tracing::info!(admin_id = %admin_id, teacher_id = %teacher.id, "created teacher");
        Ok(teacher)
    }

    pub async fn add_student(
        &self,
        admin_id: &AccountId,
        request: CreateStudentRequest,
    ) -> Result<StudentRecord, BudgetError> {
        let name = validate_name(&request.name)?;
        self.require_admin(admin_id).await?;

        let student = StudentRecord::new(admin_id.clone(), name, request.course.trim());
        let student = self.students.create(&student).await?;

        tracing::debug!(admin_id = %admin_id, student_id = %student.id, "added student");
        Ok(student)
    }

    pub async fn get_account(&self, id: &AccountId) -> Result<Account, BudgetError> {
        load_account(&*self.accounts, id).await
    }

    pub async fn get_student(&self, id: &StudentId) -> Result<StudentRecord, BudgetError> {
        self.students
            .get_by_id(id)
            .await?
            .ok_or_else(|| BudgetError::StudentNotFound(id.to_string()))
    }

    pub async fn list_admins(&self) -> Result<Vec<Account>, BudgetError> {
        let filter = AccountFilter {
            role: Some(Role::Admin),
            ..Default::default()
        };
        Ok(self.accounts.list(Some(filter)).await?)
    }

    pub async fn list_teachers(&self, admin_id: &AccountId) -> Result<Vec<Account>, BudgetError> {
        self.require_admin(admin_id).await?;
        Ok(self.accounts.list_teachers_of(admin_id).await?)
    }

    pub async fn list_students(&self, admin_id: &AccountId) -> Result<Vec<StudentRecord>, BudgetError> {
        self.require_admin(admin_id).await?;
        Ok(self.students.list_by_admin(admin_id).await?)
    }

    /// Replace an admin's ceiling. Usage is untouched, so lowering the limit
    /// below current usage is allowed and leaves the admin over its budget.
    pub async fn set_admin_limit(&self, admin_id: &AccountId, limit: u64) -> Result<Account, BudgetError> {
        validate_limit(limit)?;
        let mut admin = self.require_admin(admin_id).await?;

        let previous = admin.token_usage.limit;
        admin.token_usage.limit = limit;
        admin.updated_at = chrono::Utc::now();
        let admin = self.accounts.update(&admin).await.map_err(|e| match e {
            RepositoryError::NotFound => BudgetError::AccountNotFound(admin_id.to_string()),
            other => other.into(),
        })?;

        tracing::info!(admin_id = %admin_id, previous, limit, "updated admin limit");
        Ok(admin)
    }

    /// Delete an account. Deleting an admin removes its teachers and students.
    pub async fn delete_account(&self, id: &AccountId) -> Result<(), BudgetError> {
        self.accounts.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => BudgetError::AccountNotFound(id.to_string()),
            other => other.into(),
        })?;
        tracing::info!(account_id = %id, "deleted account");
        Ok(())
    }

    pub async fn delete_student(&self, id: &StudentId) -> Result<(), BudgetError> {
        self.students.delete(id).await.map_err(|e| match e {
            RepositoryError::NotFound => BudgetError::StudentNotFound(id.to_string()),
            other => other.into(),
        })
    }

    /// The admin whose ceiling `account_id` draws from.
    pub async fn resolve_budget_owner(&self, account_id: &AccountId) -> Result<AccountId, BudgetError> {
        resolve_owner(&*self.accounts, account_id).await
    }

    async fn require_admin(&self, admin_id: &AccountId) -> Result<Account, BudgetError> {
        let account = load_account(&*self.accounts, admin_id).await?;
        if !account.is_admin() {
            return Err(BudgetError::InvalidAccount(format!(
                "'{admin_id}' is a {}, not an admin",
                account.role
            )));
        }
        Ok(account)
    }
}

fn validate_name(name: &str) -> Result<String, BudgetError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BudgetError::InvalidAccount("name cannot be empty".to_string()));
    }
    Ok(name.to_string())
}

fn validate_limit(limit: u64) -> Result<(), BudgetError> {
    if limit == 0 {
        return Err(BudgetError::InvalidAmount(
            "admin token limit must be positive".to_string(),
        ));
    }
    Ok(())
}

fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
}

fn map_conflict(e: RepositoryError) -> BudgetError {
    match e {
        RepositoryError::Conflict(msg) => BudgetError::InvalidAccount(msg),
        other => other.into(),
    }
}
