//! Tiered budget status.

use edubudget_types::account::AccountId;
use edubudget_types::error::BudgetError;
use edubudget_types::usage::{StatusTier, TokenStatus, percentage_used, round2};

use crate::repository::account::AccountRepository;
use crate::repository::ledger::UsageLedgerRepository;

use super::aggregator::UsageAggregator;
use super::resolve_owner;

pub struct StatusReporter<A, L> {
    aggregator: UsageAggregator<A, L>,
    min_analysis_tokens: u64,
}

impl<A, L> Clone for StatusReporter<A, L> {
    fn clone(&self) -> Self {
        Self {
            aggregator: self.aggregator.clone(),
            min_analysis_tokens: self.min_analysis_tokens,
        }
    }
}

impl<A: AccountRepository, L: UsageLedgerRepository> StatusReporter<A, L> {
    pub fn new(aggregator: UsageAggregator<A, L>, min_analysis_tokens: u64) -> Self {
        Self {
            aggregator,
            min_analysis_tokens,
        }
    }

    /// Report the tiered status of `admin_id`'s budget.
    ///
    /// The tier is picked from the unrounded percentage; only the reported
    /// value is rounded.
    pub async fn report_status(&self, admin_id: &AccountId) -> Result<TokenStatus, BudgetError> {
        let usage = self.aggregator.compute(admin_id).await?;

        let raw = percentage_used(usage.used, usage.limit);
        let status = StatusTier::from_percentage(raw);
        let can_analyze = usage.remaining > self.min_analysis_tokens as i64;

        if status != StatusTier::Normal {
            tracing::debug!(admin_id = %admin_id, percentage = raw, %status, "budget above alert level");
        }

        Ok(TokenStatus {
            usage,
            percentage: round2(raw),
            status,
            message: status.message().to_string(),
            can_analyze,
        })
    }

    /// Status of the budget `account_id` draws from; a teacher reports its admin's.
    pub async fn report_status_for(&self, account_id: &AccountId) -> Result<TokenStatus, BudgetError> {
        let owner = resolve_owner(self.aggregator.accounts(), account_id).await?;
        self.report_status(&owner).await
    }
}
