//! Usage recording.
//!
//! Commits the actual cost of a completed operation. The increment happens at
//! the storage layer in one atomic step and the returned counters are what
//! storage reports afterwards.

use std::sync::Arc;

use edubudget_types::account::{AccountId, TokenUsage};
use edubudget_types::error::{BudgetError, RepositoryError};
use edubudget_types::student::StudentId;
use edubudget_types::usage::{TokenCost, UsageEvent};

use crate::repository::account::AccountRepository;
use crate::repository::ledger::UsageLedgerRepository;
use crate::repository::student::StudentRepository;

use super::{ChargeContext, load_account};

pub struct UsageRecorder<A, S, L> {
    accounts: Arc<A>,
    students: Arc<S>,
    ledger: Arc<L>,
}

impl<A, S, L> Clone for UsageRecorder<A, S, L> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            students: self.students.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<A, S, L> UsageRecorder<A, S, L>
where
    A: AccountRepository,
    S: StudentRepository,
    L: UsageLedgerRepository,
{
    pub fn new(accounts: Arc<A>, students: Arc<S>, ledger: Arc<L>) -> Self {
        Self {
            accounts,
            students,
            ledger,
        }
    }

    /// Add `tokens` to the account's `used` counter.
    ///
    /// Additive, not idempotent. Zero leaves the counter unchanged but still
    /// requires the account to exist. An increment that would overflow the
    /// counter is refused with `InvalidAmount` and leaves it untouched.
    pub async fn record_usage(
        &self,
        account_id: &AccountId,
        tokens: u64,
    ) -> Result<TokenUsage, BudgetError> {
        let usage = self
            .accounts
            .increment_used(account_id, tokens)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => BudgetError::AccountNotFound(account_id.to_string()),
                RepositoryError::Overflow(msg) => BudgetError::InvalidAmount(msg),
                other => other.into(),
            })?;

        tracing::info!(
            account_id = %account_id,
            tokens,
            used = usage.used,
            "recorded usage"
        );

        Ok(usage)
    }

    /// Charge `cost.total_tokens` to `account_id` and append a ledger event
    /// attributed to the owning admin and, optionally, a student.
    ///
    /// The student (if any) is validated before the counter moves. A ledger
    /// failure after the increment is logged and does not undo the charge.
    pub async fn record_charge(
        &self,
        account_id: &AccountId,
        cost: TokenCost,
        ctx: &ChargeContext,
    ) -> Result<TokenUsage, BudgetError> {
        let account = load_account(&*self.accounts, account_id).await?;
        let owner = account.budget_owner().cloned().ok_or_else(|| {
            BudgetError::InvalidAccount(format!("teacher '{account_id}' has no owning admin"))
        })?;

        if let Some(student_id) = &ctx.student_id {
            let student = self
                .students
                .get_by_id(student_id)
                .await?
                .ok_or_else(|| BudgetError::StudentNotFound(student_id.to_string()))?;
            if student.admin_id != owner {
                return Err(BudgetError::StudentNotFound(student_id.to_string()));
            }
        }

        let usage = self.record_usage(account_id, cost.total_tokens).await?;

        let event = UsageEvent::new(
            owner,
            Some(account.id),
            ctx.student_id.clone(),
            ctx.document.clone(),
            cost,
        );
        if let Err(e) = self.ledger.append(&event).await {
            tracing::warn!(
                account_id = %account_id,
                tokens = cost.total_tokens,
                error = %e,
                "charge recorded but ledger append failed"
            );
        }

        Ok(usage)
    }

    /// Log a student's analysis in the ledger. No account counter changes.
    pub async fn record_student_usage(
        &self,
        student_id: &StudentId,
        cost: TokenCost,
        document: &str,
    ) -> Result<UsageEvent, BudgetError> {
        let student = self
            .students
            .get_by_id(student_id)
            .await?
            .ok_or_else(|| BudgetError::StudentNotFound(student_id.to_string()))?;

        let event = UsageEvent::new(student.admin_id, None, Some(student.id), document, cost);
        self.ledger.append(&event).await?;

        tracing::debug!(
            student_id = %student_id,
            tokens = cost.total_tokens,
            "recorded student usage"
        );

        Ok(event)
    }
}
