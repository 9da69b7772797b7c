//! Serialized admission and charging per admin.
//!
//! [`AdmissionController::can_allow`] is advisory: two callers can both pass
//! the check and then both record. `BudgetGuard` closes that window. For each
//! admin it keeps a gate and a counter of tokens reserved by operations still
//! in flight. Admission under the gate evaluates
//! `used + reserved + requested <= limit` and reserves on success. Commit
//! takes the gate again, records the actual cost, then releases the
//! reservation. The gate is never held while the external operation runs.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::Mutex;

use edubudget_types::account::{AccountId, TokenUsage};
use edubudget_types::error::BudgetError;
use edubudget_types::usage::{AdmissionDecision, TokenCost};

use crate::repository::account::AccountRepository;
use crate::repository::ledger::UsageLedgerRepository;
use crate::repository::student::StudentRepository;

use super::admission::AdmissionController;
use super::recorder::UsageRecorder;
use super::{ChargeContext, resolve_owner};

/// Failure of a guarded charge.
#[derive(Debug, thiserror::Error)]
pub enum ChargeError<E = Infallible> {
    /// Admission refused; the operation was never started.
    #[error("admission denied: {}", .0.reason)]
    Denied(AdmissionDecision),

    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// The guarded operation itself failed. Nothing was charged.
    #[error("operation failed: {0}")]
    Operation(E),
}

impl ChargeError<Infallible> {
    /// Reinterpret a reservation error as the error of a guarded operation.
    pub fn widen<E>(self) -> ChargeError<E> {
        match self {
            ChargeError::Denied(decision) => ChargeError::Denied(decision),
            ChargeError::Budget(e) => ChargeError::Budget(e),
            ChargeError::Operation(never) => match never {},
        }
    }
}

#[derive(Default)]
struct AdminSlot {
    gate: Mutex<()>,
    reserved: AtomicU64,
}

type SlotMap = DashMap<AccountId, Arc<AdminSlot>>;

/// Remove the admin's slot when only `holders` handles remain (the map's own
/// included) and nothing is reserved.
///
/// `remove_if` runs under the same shard lock `BudgetGuard::slot` takes, so no
/// new handle can appear while the count is checked.
fn prune_slot(slots: &SlotMap, admin_id: &AccountId, holders: usize) {
    slots.remove_if(admin_id, |_, slot| {
        Arc::strong_count(slot) <= holders && slot.reserved.load(Ordering::SeqCst) == 0
    });
}

/// Tokens held against an admin's ceiling until commit.
///
/// Dropping an uncommitted reservation gives the tokens back.
pub struct Reservation {
    admin_id: AccountId,
    account_id: AccountId,
    tokens: u64,
    slot: Arc<AdminSlot>,
    slots: Arc<SlotMap>,
    decision: AdmissionDecision,
    released: bool,
}

impl Reservation {
    /// Admin whose ceiling holds the reservation.
    pub fn admin_id(&self) -> &AccountId {
        &self.admin_id
    }

    /// Account the cost will be charged to.
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn decision(&self) -> &AdmissionDecision {
        &self.decision
    }

    fn release(&mut self) {
        if !self.released {
            self.slot.reserved.fetch_sub(self.tokens, Ordering::SeqCst);
            self.released = true;
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(
                admin_id = %self.admin_id,
                tokens = self.tokens,
                "reservation dropped without commit"
            );
        }
        self.release();
        // The map and this reservation.
        prune_slot(&self.slots, &self.admin_id, 2);
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("admin_id", &self.admin_id)
            .field("account_id", &self.account_id)
            .field("tokens", &self.tokens)
            .field("released", &self.released)
            .finish()
    }
}

/// Result of a guarded operation.
#[derive(Debug, Clone)]
pub struct Charged<T> {
    pub value: T,
    pub cost: TokenCost,
    /// Counters of the charged account after the commit.
    pub usage: TokenUsage,
}

pub struct BudgetGuard<A, S, L> {
    admission: AdmissionController<A, L>,
    recorder: UsageRecorder<A, S, L>,
    slots: Arc<SlotMap>,
}

impl<A, S, L> BudgetGuard<A, S, L>
where
    A: AccountRepository,
    S: StudentRepository,
    L: UsageLedgerRepository,
{
    pub fn new(admission: AdmissionController<A, L>, recorder: UsageRecorder<A, S, L>) -> Self {
        Self {
            admission,
            recorder,
            slots: Arc::new(DashMap::new()),
        }
    }

    fn slot(&self, admin_id: &AccountId) -> Arc<AdminSlot> {
        self.slots.entry(admin_id.clone()).or_default().value().clone()
    }

    /// Tokens currently reserved against `admin_id`.
    pub fn in_flight(&self, admin_id: &AccountId) -> u64 {
        self.slots
            .get(admin_id)
            .map(|slot| slot.reserved.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Check and reserve `estimate` tokens for an operation run by `account_id`.
    ///
    /// A teacher reserves against its admin's ceiling.
    pub async fn reserve(
        &self,
        account_id: &AccountId,
        estimate: u64,
    ) -> Result<Reservation, ChargeError> {
        let admin_id = resolve_owner(self.admission.aggregator().accounts(), account_id).await?;
        let slot = self.slot(&admin_id);

        let outcome = {
            let _gate = slot.gate.lock().await;
            let reserved = slot.reserved.load(Ordering::SeqCst);
            let outcome = self.admission.decide(&admin_id, estimate, reserved).await;
            if matches!(&outcome, Ok(decision) if decision.allowed) {
                slot.reserved.fetch_add(estimate, Ordering::SeqCst);
            }
            outcome
        };

        let decision = match outcome {
            Ok(decision) if decision.allowed => decision,
            refused => {
                drop(slot);
                prune_slot(&self.slots, &admin_id, 1);
                return Err(match refused {
                    Ok(decision) => ChargeError::Denied(decision),
                    Err(e) => ChargeError::Budget(e),
                });
            }
        };

        tracing::debug!(
            admin_id = %admin_id,
            account_id = %account_id,
            tokens = estimate,
            "reserved tokens"
        );

        Ok(Reservation {
            admin_id,
            account_id: account_id.clone(),
            tokens: estimate,
            slot,
            slots: self.slots.clone(),
            decision,
            released: false,
        })
    }

    /// Record the actual `cost` and release the reservation.
    ///
    /// The cost may differ from the reserved estimate; the full cost is
    /// charged either way. The reservation is released even when recording
    /// fails.
    pub async fn commit(
        &self,
        mut reservation: Reservation,
        cost: TokenCost,
        ctx: &ChargeContext,
    ) -> Result<TokenUsage, BudgetError> {
        let result = {
            let slot = reservation.slot.clone();
            let _gate = slot.gate.lock().await;
            let result = self
                .recorder
                .record_charge(&reservation.account_id, cost, ctx)
                .await;
            reservation.release();
            result
        };

        if let Err(e) = &result {
            tracing::error!(
                admin_id = %reservation.admin_id,
                account_id = %reservation.account_id,
                tokens = cost.total_tokens,
                error = %e,
                "failed to commit charge"
            );
        }

        result
    }

    /// Reserve `estimate`, run `op`, then commit the cost it reports.
    ///
    /// On denial `op` is never called. If `op` fails the reservation is
    /// released and nothing is charged.
    pub async fn run_charged<T, E, F, Fut>(
        &self,
        account_id: &AccountId,
        estimate: u64,
        ctx: &ChargeContext,
        op: F,
    ) -> Result<Charged<T>, ChargeError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, TokenCost), E>>,
    {
        let reservation = self
            .reserve(account_id, estimate)
            .await
            .map_err(|e| e.widen())?;

        let (value, cost) = op().await.map_err(ChargeError::Operation)?;

        let usage = self.commit(reservation, cost, ctx).await?;
        Ok(Charged { value, cost, usage })
    }
}
