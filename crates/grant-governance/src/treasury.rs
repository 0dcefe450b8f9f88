use crate::access::AccessControlRegistry;
use crate::events::{EventLog, GovernanceEvent};
use crate::metrics;
use crate::oracle::FundsTransfer;
use crate::types::{DepositRecord, OutflowKind, OutflowRecord, Role, TreasuryStats};
use crate::{GovernanceError, Result};
use grant_types::{FundAmount, Principal, ProposalId, FUND_BASE_UNIT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Holds the "payout in progress" flag for the lifetime of one outflow.
struct OutflowGuard<'a>(&'a AtomicBool);

impl<'a> OutflowGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GovernanceError::ReentrantCall)?;
        Ok(Self(flag))
    }
}

impl Drop for OutflowGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Shared grant fund
///
/// Ledger counters always satisfy `balance == total_deposited - total_disbursed`.
/// Outflows debit the ledger before the external transfer and credit it back
/// if the transfer fails.
pub struct TreasuryLedger {
    access: Arc<AccessControlRegistry>,
    events: Arc<EventLog>,
    bank: Arc<dyn FundsTransfer>,
    state: Arc<RwLock<TreasuryStats>>,
    deposits: Arc<RwLock<Vec<DepositRecord>>>,
    outflows: Arc<RwLock<Vec<OutflowRecord>>>,
    in_flight: AtomicBool,
}

impl TreasuryLedger {
    pub fn new(
        access: Arc<AccessControlRegistry>,
        events: Arc<EventLog>,
        bank: Arc<dyn FundsTransfer>,
    ) -> Self {
        Self {
            access,
            events,
            bank,
            state: Arc::new(RwLock::new(TreasuryStats::default())),
            deposits: Arc::new(RwLock::new(Vec::new())),
            outflows: Arc::new(RwLock::new(Vec::new())),
            in_flight: AtomicBool::new(false),
        }
    }

    pub async fn balance(&self) -> FundAmount {
        self.state.read().await.balance
    }

    pub async fn stats(&self) -> TreasuryStats {
        *self.state.read().await
    }

    pub async fn deposits(&self) -> Vec<DepositRecord> {
        self.deposits.read().await.clone()
    }

    pub async fn outflows(&self) -> Vec<OutflowRecord> {
        self.outflows.read().await.clone()
    }

    /// Permissionless top-up of the fund
    pub async fn deposit(
        &self,
        from: Principal,
        amount: FundAmount,
        note: impl Into<String>,
    ) -> Result<()> {
        if amount.is_zero() {
            return Err(GovernanceError::ZeroAmount);
        }
        let note = note.into();

        let mut state = self.state.write().await;
        let balance = state
            .balance
            .checked_add(amount)
            .ok_or(GovernanceError::LedgerOverflow)?;
        let total_deposited = state
            .total_deposited
            .checked_add(amount)
            .ok_or(GovernanceError::LedgerOverflow)?;
        state.balance = balance;
        state.total_deposited = total_deposited;
        drop(state);

        self.deposits.write().await.push(DepositRecord {
            from,
            amount,
            note: note.clone(),
            timestamp: self.events.now(),
        });
        self.events
            .emit(GovernanceEvent::FundsDeposited { from, amount, note })
            .await;

        metrics::TREASURY_OPERATIONS
            .with_label_values(&["deposit", "ok"])
            .inc();
        set_balance_gauge(balance);

        info!(from = %from.short(), amount = %amount, balance = %balance, "💰 Funds deposited");
        Ok(())
    }

    /// Pays out an executed grant. Only the registered executor may call this.
    ///
    /// The in-flight guard is ledger-wide, not per call stack: while any
    /// outflow is awaiting its transfer, every other outflow fails with
    /// [`GovernanceError::ReentrantCall`], including an unrelated execution
    /// on another task. Callers running executions concurrently should
    /// serialize them or retry on that error.
    pub async fn disburse_grant(
        &self,
        caller: &Principal,
        recipient: Principal,
        amount: FundAmount,
        proposal_id: ProposalId,
    ) -> Result<()> {
        let _guard = OutflowGuard::acquire(&self.in_flight).map_err(|e| {
            warn!(proposal_id, caller = %caller.short(), "🚫 Reentrant disbursement rejected");
            record_failure("disburse", &e);
            e
        })?;

        let result = async {
            self.access.require_role(Role::Executor, caller).await?;
            if recipient.is_zero() {
                return Err(GovernanceError::NullRecipient);
            }
            self.pay_out(recipient, amount, OutflowKind::Grant { proposal_id })
                .await
        }
        .await;

        match result {
            Ok(()) => {
                self.events
                    .emit(GovernanceEvent::GrantDisbursed {
                        recipient,
                        amount,
                        proposal_id,
                    })
                    .await;
                info!(
                    proposal_id,
                    recipient = %recipient.short(),
                    amount = %amount,
                    "💸 Grant disbursed"
                );
                Ok(())
            }
            Err(e) => {
                record_failure("disburse", &e);
                Err(e)
            }
        }
    }

    /// Privileged escape hatch outside the proposal process.
    pub async fn emergency_withdraw(
        &self,
        caller: &Principal,
        to: Principal,
        amount: FundAmount,
    ) -> Result<()> {
        let _guard = OutflowGuard::acquire(&self.in_flight)?;

        let result = async {
            self.access.require_role(Role::SuperAdmin, caller).await?;
            if to.is_zero() {
                return Err(GovernanceError::NullRecipient);
            }
            self.pay_out(to, amount, OutflowKind::Emergency).await
        }
        .await;

        match result {
            Ok(()) => {
                self.events
                    .emit(GovernanceEvent::EmergencyWithdraw { to, amount })
                    .await;
                warn!(
                    to = %to.short(),
                    amount = %amount,
                    by = %caller.short(),
                    "🚨 Emergency withdrawal executed"
                );
                Ok(())
            }
            Err(e) => {
                record_failure("emergency_withdraw", &e);
                Err(e)
            }
        }
    }

    /// Debit, transfer, and credit back on transfer failure.
    async fn pay_out(&self, to: Principal, amount: FundAmount, kind: OutflowKind) -> Result<()> {
        if amount.is_zero() {
            return Err(GovernanceError::ZeroAmount);
        }

        let mut state = self.state.write().await;
        let balance = state
            .balance
            .checked_sub(amount)
            .ok_or(GovernanceError::InsufficientFunds {
                required: amount,
                available: state.balance,
            })?;
        let total_disbursed = state
            .total_disbursed
            .checked_add(amount)
            .ok_or(GovernanceError::LedgerOverflow)?;
        state.balance = balance;
        state.total_disbursed = total_disbursed;
        if kind == OutflowKind::Emergency {
            state.total_emergency_withdrawn =
                state.total_emergency_withdrawn.saturating_add(amount);
        }
        drop(state);

        debug!(to = %to.short(), amount = %amount, "🔒 Ledger debited, transferring");

        if let Err(reason) = self.bank.transfer(to, amount).await {
            let mut state = self.state.write().await;
            state.balance = state.balance.saturating_add(amount);
            state.total_disbursed = state.total_disbursed.saturating_sub(amount);
            if kind == OutflowKind::Emergency {
                state.total_emergency_withdrawn =
                    state.total_emergency_withdrawn.saturating_sub(amount);
            }
            drop(state);

            warn!(
                to = %to.short(),
                amount = %amount,
                reason = %reason,
                "↩️ Transfer failed, ledger restored"
            );
            return Err(GovernanceError::TransferFailed(reason));
        }

        self.outflows.write().await.push(OutflowRecord {
            to,
            amount,
            kind,
            timestamp: self.events.now(),
        });

        let operation = match kind {
            OutflowKind::Grant { .. } => "disburse",
            OutflowKind::Emergency => "emergency_withdraw",
        };
        metrics::TREASURY_OPERATIONS
            .with_label_values(&[operation, "ok"])
            .inc();
        set_balance_gauge(balance);
        Ok(())
    }
}

fn record_failure(operation: &str, err: &GovernanceError) {
    metrics::TREASURY_OPERATIONS
        .with_label_values(&[operation, err.kind().as_str()])
        .inc();
}

fn set_balance_gauge(balance: FundAmount) {
    let units = balance.to_base_units() / FUND_BASE_UNIT;
    metrics::TREASURY_BALANCE.set(i64::try_from(units).unwrap_or(i64::MAX));
}
