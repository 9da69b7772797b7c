//! Usage aggregation for an admin's budget.
//!
//! `used = admin direct usage + sum of the admin's teachers' usage`. Student
//! usage is reported alongside but never enters `used`. Always recomputed
//! from the repositories; two calls separated by a write may differ.

use std::sync::Arc;

use edubudget_types::account::AccountId;
use edubudget_types::error::BudgetError;
use edubudget_types::usage::AggregatedUsage;

use crate::repository::account::AccountRepository;
use crate::repository::ledger::UsageLedgerRepository;

pub struct UsageAggregator<A, L> {
    accounts: Arc<A>,
    ledger: Arc<L>,
}

impl<A, L> Clone for UsageAggregator<A, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<A: AccountRepository, L: UsageLedgerRepository> UsageAggregator<A, L> {
    pub fn new(accounts: Arc<A>, ledger: Arc<L>) -> Self {
        Self { accounts, ledger }
    }

    pub(crate) fn accounts(&self) -> &A {
        &self.accounts
    }

    /// Compute the aggregated usage for `admin_id`.
    ///
    /// Fails with `AccountNotFound` when no admin has that id (a teacher id
    /// counts as not found). Read-only.
    pub async fn compute(&self, admin_id: &AccountId) -> Result<AggregatedUsage, BudgetError> {
        let admin = self
            .accounts
            .get_by_id(admin_id)
            .await?
            .filter(|a| a.is_admin())
            .ok_or_else(|| BudgetError::AccountNotFound(admin_id.to_string()))?;

        let teachers = self.accounts.list_teachers_of(admin_id).await?;
        let teachers_usage = teachers
            .iter()
            .fold(0, |total: u64, t| total.saturating_add(t.token_usage.used));

        let students_usage = self.ledger.students_total(admin_id).await?;

        let usage = AggregatedUsage::new(
            admin.id,
            admin.token_usage.used,
            teachers_usage,
            students_usage,
            teachers.len(),
            admin.token_usage.limit,
        );

        tracing::debug!(
            admin_id = %admin_id,
            used = usage.used,
            limit = usage.limit,
            teachers = usage.teacher_count,
            "aggregated usage"
        );

        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::student::StudentRepository;
    use crate::testing::FakeStore;
    use edubudget_types::usage::{TokenCost, UsageEvent};

    #[tokio::test]
    async fn test_sums_direct_and_teacher_usage() {
        let store = FakeStore::new();
        let admin = store.seed_admin(8_000, 10_000);
        store.seed_teacher(&admin, 1_000);

        let aggregator = UsageAggregator::new(store.clone(), store.clone());
        let usage = aggregator.compute(&admin).await.unwrap();

        assert_eq!(usage.admin_direct_usage, 8_000);
        assert_eq!(usage.teachers_usage, 1_000);
        assert_eq!(usage.used, 9_000);
        assert_eq!(usage.remaining, 1_000);
        assert_eq!(usage.teacher_count, 1);
    }

    #[tokio::test]
    async fn test_many_teachers() {
        let store = FakeStore::new();
        let admin = store.seed_admin(50, 100_000);
        for used in [10, 20, 30, 40] {
            store.seed_teacher(&admin, used);
        }

        let aggregator = UsageAggregator::new(store.clone(), store.clone());
        let usage = aggregator.compute(&admin).await.unwrap();
        assert_eq!(usage.used, 150);
        assert_eq!(usage.teacher_count, 4);
    }

    #[tokio::test]
    async fn test_other_admins_teachers_are_ignored() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 10_000);
        let other = store.seed_admin(0, 10_000);
        store.seed_teacher(&admin, 300);
        store.seed_teacher(&other, 7_000);

        let aggregator = UsageAggregator::new(store.clone(), store.clone());
        assert_eq!(aggregator.compute(&admin).await.unwrap().used, 300);
    }

    #[tokio::test]
    async fn test_student_usage_is_informational() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 5_000);
        let student = store.seed_student(&admin, "Lucia");
        store
            .append(&UsageEvent::new(
                admin.clone(),
                None,
                Some(student),
                "essay.docx",
                TokenCost::total(50_000),
            ))
            .await
            .unwrap();

        let aggregator = UsageAggregator::new(store.clone(), store.clone());
        let usage = aggregator.compute(&admin).await.unwrap();
        assert_eq!(usage.students_usage, 50_000);
        assert_eq!(usage.used, 0);
        assert_eq!(usage.remaining, 5_000);
    }

    #[tokio::test]
    async fn test_teacher_sum_saturates() {
        let store = FakeStore::new();
        let admin = store.seed_admin(1, 10_000);
        store.seed_teacher(&admin, u64::MAX - 1);
        store.seed_teacher(&admin, 5);

        let aggregator = UsageAggregator::new(store.clone(), store.clone());
        let usage = aggregator.compute(&admin).await.unwrap();
        assert_eq!(usage.teachers_usage, u64::MAX);
        assert_eq!(usage.used, u64::MAX);
        assert!(usage.remaining < 0);
    }

    #[tokio::test]
    async fn test_deleted_students_leave_students_usage() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 5_000);
        let kept = store.seed_student(&admin, "Ana");
        let gone = store.seed_student(&admin, "Bruno");
        for (student, tokens) in [(&kept, 300), (&gone, 700)] {
            store
                .append(&UsageEvent::new(
                    admin.clone(),
                    None,
                    Some(student.clone()),
                    "essay.docx",
                    TokenCost::total(tokens),
                ))
                .await
                .unwrap();
        }

        let aggregator = UsageAggregator::new(store.clone(), store.clone());
        assert_eq!(aggregator.compute(&admin).await.unwrap().students_usage, 1_000);

        StudentRepository::delete(&*store, &gone).await.unwrap();
        assert_eq!(aggregator.compute(&admin).await.unwrap().students_usage, 300);
    }

    #[tokio::test]
    async fn test_unknown_admin_is_not_found() {
        let store = FakeStore::new();
        let aggregator = UsageAggregator::new(store.clone(), store.clone());

        let err = aggregator.compute(&AccountId::new()).await.unwrap_err();
        assert!(matches!(err, BudgetError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_teacher_id_is_not_an_admin() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 10_000);
        let teacher = store.seed_teacher(&admin, 10);
        let aggregator = UsageAggregator::new(store.clone(), store.clone());

        let err = aggregator.compute(&teacher).await.unwrap_err();
        assert!(matches!(err, BudgetError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_recomputed_after_writes() {
        let store = FakeStore::new();
        let admin = store.seed_admin(100, 10_000);
        let teacher = store.seed_teacher(&admin, 0);
        let aggregator = UsageAggregator::new(store.clone(), store.clone());

        assert_eq!(aggregator.compute(&admin).await.unwrap().used, 100);
        store.increment_used(&teacher, 250).await.unwrap();
        assert_eq!(aggregator.compute(&admin).await.unwrap().used, 350);

        // Deleting a teacher drops its usage; the admin's own counter stays.
        AccountRepository::delete(&*store, &teacher).await.unwrap();
        assert_eq!(aggregator.compute(&admin).await.unwrap().used, 100);
    }
}
