use crate::access::AccessControlRegistry;
use crate::clock::Clock;
use crate::events::{EventLog, GovernanceEvent};
use crate::metrics;
use crate::oracle::WeightOracle;
use crate::parameters::ConfigStore;
use crate::registry::ProposalRegistry;
use crate::treasury::TreasuryLedger;
use crate::types::{
    Proposal, ProposalMetadata, ProposalStatus, Role, TreasuryStats, VoteChoice, VoteRecord,
    VoteStats,
};
use crate::voting;
use crate::{GovernanceError, Result};
use chrono::Duration;
use grant_types::{FundAmount, Principal, ProposalId, Weight};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Proposal lifecycle manager
///
/// Drives every transition of a grant proposal:
/// - create_proposal() → ProposalCreated
/// - activate_voting() → ProposalActivated
/// - flag_proposal() → ProposalFlagged
/// - cast_vote() → VoteCast
/// - finalize_proposal() → ProposalFinalized
/// - execute_proposal() → GrantDisbursed + ProposalExecuted
/// - cancel_proposal() → ProposalCancelled
///
/// Activation, finalization and execution are permissionless and gated
/// only by proposal state and time. Mutating calls are serialized; the
/// serialization lock is released before the treasury performs the
/// external transfer, so a callback from the transfer re-enters through
/// the ordinary precondition checks.
pub struct ProposalLifecycleManager {
    /// Identity this engine presents to the treasury
    principal: Principal,
    config: Arc<ConfigStore>,
    access: Arc<AccessControlRegistry>,
    treasury: Arc<TreasuryLedger>,
    registry: Arc<ProposalRegistry>,
    oracle: Arc<dyn WeightOracle>,
    clock: Arc<dyn Clock>,
    events: Arc<EventLog>,
    op_lock: Mutex<()>,
}

impl ProposalLifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        principal: Principal,
        config: Arc<ConfigStore>,
        access: Arc<AccessControlRegistry>,
        treasury: Arc<TreasuryLedger>,
        registry: Arc<ProposalRegistry>,
        oracle: Arc<dyn WeightOracle>,
        clock: Arc<dyn Clock>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            principal,
            config,
            access,
            treasury,
            registry,
            oracle,
            clock,
            events,
            op_lock: Mutex::new(()),
        }
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    /// Submit a new grant proposal
    pub async fn create_proposal(
        &self,
        proposer: Principal,
        recipient: Principal,
        amount: FundAmount,
        metadata: ProposalMetadata,
    ) -> Result<ProposalId> {
        let result = self.try_create(proposer, recipient, amount, metadata).await;
        observe("create", result)
    }

    async fn try_create(
        &self,
        proposer: Principal,
        recipient: Principal,
        amount: FundAmount,
        metadata: ProposalMetadata,
    ) -> Result<ProposalId> {
        let _op = self.op_lock.lock().await;
        self.access.ensure_not_paused().await?;
        let params = self.config.get().await;

        let weight = self.oracle.current_weight(&proposer).await;
        if weight < params.proposal_threshold {
            return Err(GovernanceError::InsufficientWeight {
                required: params.proposal_threshold,
                actual: weight,
            });
        }
        if recipient.is_zero() {
            return Err(GovernanceError::NullRecipient);
        }
        if amount.is_zero() {
            return Err(GovernanceError::ZeroAmount);
        }
        if amount > params.max_grant_amount {
            return Err(GovernanceError::AmountExceedsCap {
                amount,
                max: params.max_grant_amount,
            });
        }
        // Soft check; re-validated at execution
        let available = self.treasury.balance().await;
        if amount > available {
            return Err(GovernanceError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        metadata.validate()?;

        let created_at = self.clock.now();
        let vote_start = created_at + secs(params.voting_delay_secs);
        let vote_end = vote_start + secs(params.voting_period_secs);
        let execution_time = vote_end + secs(params.timelock_delay_secs);

        let proposal = self
            .registry
            .insert_with(|id| Proposal {
                id,
                proposer,
                recipient,
                amount,
                created_at,
                vote_start,
                vote_end,
                execution_time,
                for_votes: 0,
                against_votes: 0,
                abstain_votes: 0,
                status: ProposalStatus::Pending,
                flagged: false,
                metadata,
            })
            .await;

        self.events
            .emit(GovernanceEvent::ProposalCreated {
                id: proposal.id,
                proposer,
                recipient,
                amount,
                title: proposal.metadata.title.clone(),
                category: proposal.metadata.category.clone(),
            })
            .await;

        metrics::PROPOSALS_CREATED
            .with_label_values(&[proposal.metadata.category.as_str()])
            .inc();

        info!(
            proposal_id = proposal.id,
            proposer = %proposer.short(),
            recipient = %recipient.short(),
            amount = %amount,
            vote_start = %vote_start,
            "📜 Proposal submitted"
        );

        Ok(proposal.id)
    }

    /// Open voting once the review delay has elapsed. Anyone may call.
    pub async fn activate_voting(&self, id: ProposalId) -> Result<()> {
        let result = self.try_activate(id).await;
        observe("activate", result)
    }

    async fn try_activate(&self, id: ProposalId) -> Result<()> {
        let _op = self.op_lock.lock().await;
        let proposal = self.load(id).await?;

        expect_status(&proposal, ProposalStatus::Pending)?;
        if proposal.flagged {
            return Err(GovernanceError::ProposalFlagged(id));
        }
        let now = self.clock.now();
        if now < proposal.vote_start {
            return Err(GovernanceError::VotingNotStarted {
                starts_at: proposal.vote_start.timestamp(),
            });
        }

        let proposal = self
            .registry
            .transition(id, ProposalStatus::Active, |_| {})
            .await?;
        record_transition(ProposalStatus::Pending, ProposalStatus::Active);

        self.events
            .emit(GovernanceEvent::ProposalActivated {
                id,
                vote_start: proposal.vote_start,
                vote_end: proposal.vote_end,
            })
            .await;

        info!(proposal_id = id, vote_end = %proposal.vote_end, "🗳️ Voting opened");
        Ok(())
    }

    /// Curator veto during the review window. There is no way to unflag.
    pub async fn flag_proposal(
        &self,
        curator: &Principal,
        id: ProposalId,
        reason: impl Into<String>,
    ) -> Result<()> {
        let result = self.try_flag(curator, id, reason.into()).await;
        observe("flag", result)
    }

    async fn try_flag(&self, curator: &Principal, id: ProposalId, reason: String) -> Result<()> {
        let _op = self.op_lock.lock().await;
        self.access.require_role(Role::Curator, curator).await?;
        self.registry.set_flagged(id).await?;

        self.events
            .emit(GovernanceEvent::ProposalFlagged {
                id,
                curator: *curator,
                reason: reason.clone(),
            })
            .await;

        warn!(
            proposal_id = id,
            curator = %curator.short(),
            reason = %reason,
            "🚩 Proposal flagged"
        );
        Ok(())
    }

    /// Cast a final, weight-bearing vote using the voter's live weight.
    pub async fn cast_vote(
        &self,
        voter: Principal,
        id: ProposalId,
        choice: VoteChoice,
    ) -> Result<Weight> {
        let result = self.try_vote(voter, id, choice).await;
        observe("vote", result)
    }

    async fn try_vote(
        &self,
        voter: Principal,
        id: ProposalId,
        choice: VoteChoice,
    ) -> Result<Weight> {
        let _op = self.op_lock.lock().await;
        self.access.ensure_not_paused().await?;
        let proposal = self.load(id).await?;

        expect_status(&proposal, ProposalStatus::Active)?;
        let now = self.clock.now();
        if now < proposal.vote_start {
            return Err(GovernanceError::VotingNotStarted {
                starts_at: proposal.vote_start.timestamp(),
            });
        }
        if now > proposal.vote_end {
            return Err(GovernanceError::VotingClosed {
                ended_at: proposal.vote_end.timestamp(),
            });
        }
        if self.registry.has_voted(id, &voter).await {
            return Err(GovernanceError::DuplicateVote {
                proposal_id: id,
                voter,
            });
        }
        let weight = self.oracle.current_weight(&voter).await;
        if weight == 0 {
            return Err(GovernanceError::NoVotingWeight(voter));
        }

        self.registry
            .record_vote(VoteRecord {
                proposal_id: id,
                voter,
                choice,
                weight,
                cast_at: now,
            })
            .await?;

        self.events
            .emit(GovernanceEvent::VoteCast {
                proposal_id: id,
                voter,
                choice,
                weight,
            })
            .await;

        metrics::VOTES_CAST
            .with_label_values(&[choice.as_str()])
            .inc();
        metrics::VOTE_WEIGHT
            .with_label_values(&[choice.as_str()])
            .observe(weight as f64);

        info!(
            proposal_id = id,
            voter = %voter.short(),
            choice = choice.as_str(),
            weight = %weight,
            "🗳️ Vote cast"
        );
        Ok(weight)
    }

    /// Close voting and settle the outcome. Anyone may call, once.
    pub async fn finalize_proposal(&self, id: ProposalId) -> Result<ProposalStatus> {
        let result = self.try_finalize(id).await;
        observe("finalize", result)
    }

    async fn try_finalize(&self, id: ProposalId) -> Result<ProposalStatus> {
        let _op = self.op_lock.lock().await;
        let proposal = self.load(id).await?;

        expect_status(&proposal, ProposalStatus::Active)?;
        let now = self.clock.now();
        if now <= proposal.vote_end {
            return Err(GovernanceError::VotingNotEnded {
                ends_at: proposal.vote_end.timestamp(),
            });
        }

        let total_supply = self.oracle.total_supply().await;
        let quorum_percentage = self.config.get().await.quorum_percentage;
        let stats = voting::tally(&proposal, total_supply, quorum_percentage);
        let status = voting::outcome(&stats);

        self.registry.transition(id, status, |_| {}).await?;
        record_transition(ProposalStatus::Active, status);

        self.events
            .emit(GovernanceEvent::ProposalFinalized { id, status })
            .await;

        info!(
            proposal_id = id,
            status = status.as_str(),
            for_votes = %stats.for_votes,
            against_votes = %stats.against_votes,
            abstain_votes = %stats.abstain_votes,
            quorum_needed = %stats.quorum_needed,
            quorum_reached = stats.quorum_reached,
            "📊 Proposal finalized"
        );
        Ok(status)
    }

    /// Disburse a passed grant after its timelock. Anyone may call.
    ///
    /// The proposal is marked `Executed` before the treasury transfer runs
    /// and restored to `Passed` if the disbursement fails.
    pub async fn execute_proposal(&self, id: ProposalId) -> Result<()> {
        let result = self.try_execute(id).await;
        observe("execute", result)
    }

    async fn try_execute(&self, id: ProposalId) -> Result<()> {
        let proposal = {
            let _op = self.op_lock.lock().await;
            self.access.ensure_not_paused().await?;
            let proposal = self.load(id).await?;

            expect_status(&proposal, ProposalStatus::Passed)?;
            let now = self.clock.now();
            if now < proposal.execution_time {
                return Err(GovernanceError::TimelockNotExpired {
                    remaining_secs: (proposal.execution_time - now).num_seconds().max(1),
                });
            }
            let available = self.treasury.balance().await;
            if available < proposal.amount {
                return Err(GovernanceError::InsufficientFunds {
                    required: proposal.amount,
                    available,
                });
            }

            self.registry
                .transition(id, ProposalStatus::Executed, |_| {})
                .await?
        };

        debug!(proposal_id = id, "🔒 Marked executed, disbursing");

        if let Err(e) = self
            .treasury
            .disburse_grant(&self.principal, proposal.recipient, proposal.amount, id)
            .await
        {
            let _op = self.op_lock.lock().await;
            self.registry.revert_execution(id).await?;
            warn!(proposal_id = id, error = %e, "↩️ Execution rolled back");
            return Err(e);
        }
        record_transition(ProposalStatus::Passed, ProposalStatus::Executed);

        self.events
            .emit(GovernanceEvent::ProposalExecuted {
                id,
                recipient: proposal.recipient,
                amount: proposal.amount,
            })
            .await;

        info!(
            proposal_id = id,
            recipient = %proposal.recipient.short(),
            amount = %proposal.amount,
            "✅ Proposal executed"
        );
        Ok(())
    }

    /// Withdraw a proposal before it is settled. Proposer or curator only.
    pub async fn cancel_proposal(&self, caller: &Principal, id: ProposalId) -> Result<()> {
        let result = self.try_cancel(caller, id).await;
        observe("cancel", result)
    }

    async fn try_cancel(&self, caller: &Principal, id: ProposalId) -> Result<()> {
        let _op = self.op_lock.lock().await;
        let proposal = self.load(id).await?;

        if proposal.proposer != *caller && !self.access.has_role(Role::Curator, caller).await {
            return Err(GovernanceError::NotProposerOrCurator(*caller));
        }
        if !matches!(
            proposal.status,
            ProposalStatus::Pending | ProposalStatus::Active
        ) {
            return Err(GovernanceError::InvalidStatus {
                expected: "Pending or Active".to_string(),
                found: proposal.status.as_str().to_string(),
            });
        }

        self.registry
            .transition(id, ProposalStatus::Cancelled, |_| {})
            .await?;
        record_transition(proposal.status, ProposalStatus::Cancelled);

        self.events
            .emit(GovernanceEvent::ProposalCancelled {
                id,
                cancelled_by: *caller,
            })
            .await;

        info!(proposal_id = id, by = %caller.short(), "🛑 Proposal cancelled");
        Ok(())
    }

    // ---- views ----

    pub async fn get_proposal(&self, id: ProposalId) -> Result<Proposal> {
        self.load(id).await
    }

    /// Tally recomputed from current totals and the live total supply
    pub async fn get_vote_stats(&self, id: ProposalId) -> Result<VoteStats> {
        let proposal = self.load(id).await?;
        let total_supply = self.oracle.total_supply().await;
        let quorum_percentage = self.config.get().await.quorum_percentage;
        Ok(voting::tally(&proposal, total_supply, quorum_percentage))
    }

    pub async fn get_proposer_history(&self, proposer: &Principal) -> Vec<ProposalId> {
        self.registry.proposer_history(proposer).await
    }

    pub async fn get_treasury_stats(&self) -> TreasuryStats {
        self.treasury.stats().await
    }

    pub async fn has_voted(&self, id: ProposalId, voter: &Principal) -> bool {
        self.registry.has_voted(id, voter).await
    }

    pub async fn get_vote_record(&self, id: ProposalId, voter: &Principal) -> Option<VoteRecord> {
        self.registry.vote_record(id, voter).await
    }

    /// Every vote cast on a proposal, oldest first
    pub async fn get_votes(&self, id: ProposalId) -> Result<Vec<VoteRecord>> {
        self.load(id).await?;
        Ok(self.registry.votes_for(id).await)
    }

    pub async fn proposal_count(&self) -> u64 {
        self.registry.count().await
    }

    pub async fn get_proposals_by_status(&self, status: ProposalStatus) -> Vec<Proposal> {
        self.registry.by_status(status).await
    }

    async fn load(&self, id: ProposalId) -> Result<Proposal> {
        self.registry
            .get(id)
            .await
            .ok_or(GovernanceError::ProposalNotFound(id))
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1_000))
}

fn expect_status(proposal: &Proposal, expected: ProposalStatus) -> Result<()> {
    if proposal.status != expected {
        return Err(GovernanceError::InvalidStatus {
            expected: expected.as_str().to_string(),
            found: proposal.status.as_str().to_string(),
        });
    }
    Ok(())
}

fn record_transition(from: ProposalStatus, to: ProposalStatus) {
    metrics::PROPOSAL_TRANSITIONS
        .with_label_values(&[from.as_str(), to.as_str()])
        .inc();
}

fn observe<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        metrics::REJECTED_OPERATIONS
            .with_label_values(&[operation, e.kind().as_str()])
            .inc();
        debug!(operation, error = %e, "Governance call rejected");
    }
    result
}
