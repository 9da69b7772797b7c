//! Admission control.
//!
//! Advisory allow/deny for a prospective charge, computed against freshly
//! aggregated usage. Nothing is reserved here; [`super::guard::BudgetGuard`]
//! is the serialized path that also holds the tokens until commit.

use edubudget_types::account::AccountId;
use edubudget_types::error::BudgetError;
use edubudget_types::usage::AdmissionDecision;

use crate::repository::account::AccountRepository;
use crate::repository::ledger::UsageLedgerRepository;

use super::aggregator::UsageAggregator;
use super::resolve_owner;

pub struct AdmissionController<A, L> {
    aggregator: UsageAggregator<A, L>,
    estimated_tokens: u64,
}

impl<A, L> Clone for AdmissionController<A, L> {
    fn clone(&self) -> Self {
        Self {
            aggregator: self.aggregator.clone(),
            estimated_tokens: self.estimated_tokens,
        }
    }
}

impl<A: AccountRepository, L: UsageLedgerRepository> AdmissionController<A, L> {
    /// `estimated_tokens` is the per-analysis estimate used by [`Self::preflight`].
    pub fn new(aggregator: UsageAggregator<A, L>, estimated_tokens: u64) -> Self {
        Self {
            aggregator,
            estimated_tokens,
        }
    }

    pub(crate) fn aggregator(&self) -> &UsageAggregator<A, L> {
        &self.aggregator
    }

    pub fn estimated_tokens(&self) -> u64 {
        self.estimated_tokens
    }

    /// Decide whether `admin_id` can absorb `additional_tokens` more.
    ///
    /// An unknown admin yields a denied decision with verdict
    /// `AdminNotFound` rather than an error. Storage failures propagate.
    pub async fn can_allow(
        &self,
        admin_id: &AccountId,
        additional_tokens: u64,
    ) -> Result<AdmissionDecision, BudgetError> {
        self.decide(admin_id, additional_tokens, 0).await
    }

    /// Run [`Self::can_allow`] for whichever admin `account_id` draws from,
    /// using the configured per-analysis estimate.
    ///
    /// Fails with `AccountNotFound` if `account_id` itself does not exist.
    pub async fn preflight(&self, account_id: &AccountId) -> Result<AdmissionDecision, BudgetError> {
        let owner = resolve_owner(self.aggregator.accounts(), account_id).await?;
        self.can_allow(&owner, self.estimated_tokens).await
    }

    /// Decision with `reserved` in-flight tokens counted on top of stored usage.
    pub(crate) async fn decide(
        &self,
        admin_id: &AccountId,
        additional_tokens: u64,
        reserved: u64,
    ) -> Result<AdmissionDecision, BudgetError> {
        let usage = match self.aggregator.compute(admin_id).await {
            Ok(usage) => usage,
            Err(BudgetError::AccountNotFound(_)) => {
                tracing::warn!(admin_id = %admin_id, "admission requested for unknown admin");
                return Ok(AdmissionDecision::admin_not_found(additional_tokens));
            }
            Err(e) => return Err(e),
        };

        let decision = AdmissionDecision::evaluate(&usage, additional_tokens, reserved);
        if decision.allowed {
            tracing::debug!(
                admin_id = %admin_id,
                requested = additional_tokens,
                new_total = decision.new_total,
                "admission allowed"
            );
        } else {
            tracing::info!(
                admin_id = %admin_id,
                requested = additional_tokens,
                used = decision.current_used,
                limit = decision.limit,
                excess = decision.excess,
                "admission denied"
            );
        }

        Ok(decision)
    }
}
