//! Student record repository trait definition.

use edubudget_types::account::AccountId;
use edubudget_types::error::RepositoryError;
use edubudget_types::student::{StudentId, StudentRecord};

/// Repository trait for student records owned by admins.
pub trait StudentRepository: Send + Sync {
    fn create(
        &self,
        student: &StudentRecord,
    ) -> impl std::future::Future<Output = Result<StudentRecord, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &StudentId,
    ) -> impl std::future::Future<Output = Result<Option<StudentRecord>, RepositoryError>> + Send;

    /// Students owned by `admin_id`, ordered by name.
    fn list_by_admin(
        &self,
        admin_id: &AccountId,
    ) -> impl std::future::Future<Output = Result<Vec<StudentRecord>, RepositoryError>> + Send;

    fn delete(
        &self,
        id: &StudentId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
