//! Hierarchical token budget.
//!
//! Admins own a fixed ceiling; teacher usage rolls up into it; student usage
//! is tracked in the ledger but never counted. Every component here reads the
//! per-account counters fresh from the repositories -- nothing is cached.
//!
//! - [`aggregator`]: admin direct usage + teachers' usage
//! - [`admission`]: advisory allow/deny before a chargeable operation
//! - [`recorder`]: commits the actual cost after the operation
//! - [`status`]: tiered percentage report
//! - [`summary`]: per-student ledger summaries
//! - [`guard`]: per-admin serialized check+reserve and record+release

pub mod admission;
pub mod aggregator;
pub mod guard;
pub mod recorder;
pub mod status;
pub mod summary;

use std::sync::Arc;

use edubudget_types::account::{Account, AccountId};
use edubudget_types::config::BudgetConfig;
use edubudget_types::error::BudgetError;
use edubudget_types::student::StudentId;

use crate::repository::account::AccountRepository;
use crate::repository::ledger::UsageLedgerRepository;
use crate::repository::student::StudentRepository;

use admission::AdmissionController;
use aggregator::UsageAggregator;
use guard::BudgetGuard;
use recorder::UsageRecorder;
use status::StatusReporter;
use summary::TokenSummaries;

/// What a committed charge is attributed to, besides the charged account.
#[derive(Debug, Clone, Default)]
pub struct ChargeContext {
    /// Student whose document was analyzed, if any.
    pub student_id: Option<StudentId>,
    /// Label of the analyzed document.
    pub document: String,
}

impl ChargeContext {
    pub fn document(document: impl Into<String>) -> Self {
        Self {
            student_id: None,
            document: document.into(),
        }
    }

    pub fn for_student(student_id: StudentId, document: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id),
            document: document.into(),
        }
    }
}

/// Load an account, mapping absence to `AccountNotFound`.
pub(crate) async fn load_account<A: AccountRepository>(
    accounts: &A,
    id: &AccountId,
) -> Result<Account, BudgetError> {
    accounts
        .get_by_id(id)
        .await?
        .ok_or_else(|| BudgetError::AccountNotFound(id.to_string()))
}

/// Resolve the admin whose ceiling `account_id` draws from.
pub(crate) async fn resolve_owner<A: AccountRepository>(
    accounts: &A,
    account_id: &AccountId,
) -> Result<AccountId, BudgetError> {
    let account = load_account(accounts, account_id).await?;
    account.budget_owner().cloned().ok_or_else(|| {
        BudgetError::InvalidAccount(format!("teacher '{account_id}' has no owning admin"))
    })
}

/// All budget components wired to the same repositories.
pub struct BudgetService<A, S, L> {
    aggregator: UsageAggregator<A, L>,
    admission: AdmissionController<A, L>,
    recorder: UsageRecorder<A, S, L>,
    status: StatusReporter<A, L>,
    summaries: TokenSummaries<S, L>,
    guard: BudgetGuard<A, S, L>,
}

impl<A, S, L> BudgetService<A, S, L>
where
    A: AccountRepository,
    S: StudentRepository,
    L: UsageLedgerRepository,
{
    pub fn new(accounts: Arc<A>, students: Arc<S>, ledger: Arc<L>, config: &BudgetConfig) -> Self {
        let aggregator = UsageAggregator::new(accounts.clone(), ledger.clone());
        let admission = AdmissionController::new(aggregator.clone(), config.estimated_analysis_tokens);
        let recorder = UsageRecorder::new(accounts.clone(), students.clone(), ledger.clone());
        let status = StatusReporter::new(aggregator.clone(), config.min_analysis_tokens);
        let summaries = TokenSummaries::new(students, ledger);
        let guard = BudgetGuard::new(admission.clone(), recorder.clone());

        Self {
            aggregator,
            admission,
            recorder,
            status,
            summaries,
            guard,
        }
    }

    pub fn aggregator(&self) -> &UsageAggregator<A, L> {
        &self.aggregator
    }

    pub fn admission(&self) -> &AdmissionController<A, L> {
        &self.admission
    }

    pub fn recorder(&self) -> &UsageRecorder<A, S, L> {
        &self.recorder
    }

    pub fn status(&self) -> &StatusReporter<A, L> {
        &self.status
    }

    pub fn summaries(&self) -> &TokenSummaries<S, L> {
        &self.summaries
    }

    pub fn guard(&self) -> &BudgetGuard<A, S, L> {
        &self.guard
    }
}
