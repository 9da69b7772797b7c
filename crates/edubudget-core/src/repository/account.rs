//! Account repository trait definition.

use edubudget_types::account::{Account, AccountId, Role, TokenUsage};
use edubudget_types::error::RepositoryError;

/// Filter criteria for listing accounts.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Filter by role.
    pub role: Option<Role>,
    /// Filter by owning admin (teachers only).
    pub parent_admin_id: Option<AccountId>,
}

/// Repository trait for admin and teacher accounts.
///
/// Implementations live in edubudget-infra (e.g., SqliteAccountRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait AccountRepository: Send + Sync {
    /// Create a new account. Returns the created account.
    fn create(
        &self,
        account: &Account,
    ) -> impl std::future::Future<Output = Result<Account, RepositoryError>> + Send;

    /// Get an account by its unique ID.
    fn get_by_id(
        &self,
        id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    /// List accounts with optional filtering, oldest first.
    fn list(
        &self,
        filter: Option<AccountFilter>,
    ) -> impl std::future::Future<Output = Result<Vec<Account>, RepositoryError>> + Send;

    /// All teachers whose parent is `admin_id`.
    fn list_teachers_of(
        &self,
        admin_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<Account>, RepositoryError>> + Send;

    /// Overwrite an existing account's name, email, limit and `updated_at`.
    /// Returns the stored account.
    ///
    /// `used` is never written here; only [`Self::increment_used`] moves it,
    /// so an update cannot lose a concurrent increment.
    fn update(
        &self,
        account: &Account,
    ) -> impl std::future::Future<Output = Result<Account, RepositoryError>> + Send;

    /// Atomically add `tokens` to the account's `used` counter and touch
    /// `updated_at`. Returns the persisted counters after the increment.
    ///
    /// Must be a single atomic step at the storage layer: concurrent calls
    /// never lose an increment. An increment past what the store can hold
    /// fails with [`RepositoryError::Overflow`] before anything is written.
    fn increment_used(
        &self,
        id: &AccountId,
        tokens: u64,
    ) -> impl std::future::Future<Output = Result<TokenUsage, RepositoryError>> + Send;

    /// Permanently delete an account. Deleting an admin also removes its
    /// teachers and student records.
    fn delete(
        &self,
        id: &AccountId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
