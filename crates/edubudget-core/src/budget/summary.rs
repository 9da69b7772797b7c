//! Per-student token summaries built from the usage ledger.

use std::collections::HashMap;
use std::sync::Arc;

use edubudget_types::account::AccountId;
use edubudget_types::error::BudgetError;
use edubudget_types::student::StudentId;
use edubudget_types::usage::TokenSummary;

use crate::repository::ledger::UsageLedgerRepository;
use crate::repository::student::StudentRepository;

pub struct TokenSummaries<S, L> {
    students: Arc<S>,
    ledger: Arc<L>,
}

impl<S, L> Clone for TokenSummaries<S, L> {
    fn clone(&self) -> Self {
        Self {
            students: self.students.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: StudentRepository, L: UsageLedgerRepository> TokenSummaries<S, L> {
    pub fn new(students: Arc<S>, ledger: Arc<L>) -> Self {
        Self { students, ledger }
    }

    pub async fn student_summary(&self, student_id: &StudentId) -> Result<TokenSummary, BudgetError> {
        let student = self
            .students
            .get_by_id(student_id)
            .await?
            .ok_or_else(|| BudgetError::StudentNotFound(student_id.to_string()))?;

        let mut summary = TokenSummary::empty(student.id, student.name);
        for event in self.ledger.list_for_student(student_id).await? {
            summary.add(&event.cost);
        }
        Ok(summary)
    }

    /// One summary per student of `admin_id`, highest total first.
    ///
    /// Students without any ledger entry are included with zero totals.
    pub async fn student_summaries(
        &self,
        admin_id: &AccountId,
    ) -> Result<Vec<TokenSummary>, BudgetError> {
        let students = self.students.list_by_admin(admin_id).await?;
        let mut by_id: HashMap<StudentId, TokenSummary> = students
            .into_iter()
            .map(|s| (s.id.clone(), TokenSummary::empty(s.id, s.name)))
            .collect();

        for event in self.ledger.list_for_admin(admin_id).await? {
            let Some(student_id) = &event.student_id else {
                continue;
            };
            // Events for a since-deleted student are skipped.
            if let Some(summary) = by_id.get_mut(student_id) {
                summary.add(&event.cost);
            }
        }

        let mut summaries: Vec<TokenSummary> = by_id.into_values().collect();
        summaries.sort_by(|a, b| {
            b.total_tokens
                .cmp(&a.total_tokens)
                .then_with(|| a.student_name.cmp(&b.student_name))
        });
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeStore;
    use edubudget_types::usage::{TokenCost, UsageEvent};

    async fn log(store: &FakeStore, admin: &AccountId, student: &StudentId, cost: TokenCost) {
        store
            .append(&UsageEvent::new(
                admin.clone(),
                None,
                Some(student.clone()),
                "doc.pdf",
                cost,
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_student_summary_totals_and_average() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 10_000);
        let student = store.seed_student(&admin, "Valentina");
        log(&store, &admin, &student, TokenCost::new(1_000, 200)).await;
        log(&store, &admin, &student, TokenCost::new(500, 101)).await;

        let summaries = TokenSummaries::new(store.clone(), store.clone());
        let summary = summaries.student_summary(&student).await.unwrap();

        assert_eq!(summary.student_name, "Valentina");
        assert_eq!(summary.total_prompt_tokens, 1_500);
        assert_eq!(summary.total_completion_tokens, 301);
        assert_eq!(summary.total_tokens, 1_801);
        assert_eq!(summary.request_count, 2);
        assert_eq!(summary.average_tokens_per_request, 901);
    }

    #[tokio::test]
    async fn test_student_without_events_is_empty() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 10_000);
        let student = store.seed_student(&admin, "Diego");

        let summaries = TokenSummaries::new(store.clone(), store.clone());
        let summary = summaries.student_summary(&student).await.unwrap();
        assert_eq!(summary.request_count, 0);
        assert_eq!(summary.average_tokens_per_request, 0);
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let store = FakeStore::new();
        let summaries = TokenSummaries::new(store.clone(), store.clone());
        let err = summaries.student_summary(&StudentId::new()).await.unwrap_err();
        assert!(matches!(err, BudgetError::StudentNotFound(_)));
    }

    #[tokio::test]
    async fn test_summaries_sorted_by_total_desc() {
        let store = FakeStore::new();
        let admin = store.seed_admin(0, 10_000);
        let other = store.seed_admin(0, 10_000);
        let low = store.seed_student(&admin, "Ana");
        let high = store.seed_student(&admin, "Bruno");
        let idle = store.seed_student(&admin, "Carla");
        let foreign = store.seed_student(&other, "Dario");
        log(&store, &admin, &low, TokenCost::total(100)).await;
        log(&store, &admin, &high, TokenCost::total(900)).await;
        log(&store, &admin, &high, TokenCost::total(100)).await;
        log(&store, &other, &foreign, TokenCost::total(5_000)).await;

        let summaries = TokenSummaries::new(store.clone(), store.clone());
        let list = summaries.student_summaries(&admin).await.unwrap();

        let names: Vec<&str> = list.iter().map(|s| s.student_name.as_str()).collect();
        assert_eq!(names, vec!["Bruno", "Ana", "Carla"]);
        assert_eq!(list[0].total_tokens, 1_000);
        assert_eq!(list[0].request_count, 2);
        assert_eq!(list[2].student_id, idle);
        assert_eq!(list[2].total_tokens, 0);
    }
}
