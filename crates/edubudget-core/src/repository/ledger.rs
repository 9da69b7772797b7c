//! Usage ledger trait definition.
//!
//! The ledger is an append-only log of committed charges. Account counters
//! are the source of truth for budget math; the ledger feeds per-student
//! reporting, which never takes part in a limit check.

use edubudget_types::account::AccountId;
use edubudget_types::error::RepositoryError;
use edubudget_types::student::StudentId;
use edubudget_types::usage::UsageEvent;

pub trait UsageLedgerRepository: Send + Sync {
    /// Append one event.
    fn append(
        &self,
        event: &UsageEvent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Sum of `total_tokens` over events attributed to a student currently on
    /// the roster of `admin_id`. Events of deleted students stay in the
    /// ledger but no longer count.
    fn students_total(
        &self,
        admin_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Events attributed to one student, oldest first.
    fn list_for_student(
        &self,
        student_id: &StudentId,
    ) -> impl std::future::Future<Output = Result<Vec<UsageEvent>, RepositoryError>> + Send;

    /// Every event owned by `admin_id`, oldest first.
    fn list_for_admin(
        &self,
        admin_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<UsageEvent>, RepositoryError>> + Send;
}
