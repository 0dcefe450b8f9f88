use crate::types::{LifecycleState, Proposal, ProposalStatus, VoteChoice, VoteRecord};
use crate::{GovernanceError, Result};
use grant_types::{Principal, ProposalId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct RegistryState {
    next_id: ProposalId,
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: HashMap<(ProposalId, Principal), VoteRecord>,
    proposer_history: HashMap<Principal, Vec<ProposalId>>,
}

/// Proposal records, vote records and per-proposer history.
///
/// Terminal proposals are never modified through this API; the only
/// backwards move is [`ProposalRegistry::revert_execution`].
#[derive(Debug, Clone)]
pub struct ProposalRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for ProposalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                next_id: 1,
                ..Default::default()
            })),
        }
    }

    /// Allocates the next id and stores the proposal built for it.
    pub async fn insert_with<F>(&self, build: F) -> Proposal
    where
        F: FnOnce(ProposalId) -> Proposal,
    {
        let mut state = self.state.write().await;
        let id = state.next_id;
        let proposal = build(id);
        state.next_id += 1;
        state
            .proposer_history
            .entry(proposal.proposer)
            .or_default()
            .push(id);
        state.proposals.insert(id, proposal.clone());
        proposal
    }

    pub async fn get(&self, id: ProposalId) -> Option<Proposal> {
        self.state.read().await.proposals.get(&id).cloned()
    }

    /// Moves a live proposal to `next`, applying `mutate` in the same step.
    pub async fn transition<F>(
        &self,
        id: ProposalId,
        next: ProposalStatus,
        mutate: F,
    ) -> Result<Proposal>
    where
        F: FnOnce(&mut Proposal),
    {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        if !proposal.status.can_transition_to(&next) {
            return Err(GovernanceError::InvalidStatus {
                expected: format!("a status that can become {}", next.as_str()),
                found: proposal.status.as_str().to_string(),
            });
        }
        mutate(proposal);
        proposal.status = next;
        Ok(proposal.clone())
    }

    /// Sets the one-way flag on a pending proposal.
    pub async fn set_flagged(&self, id: ProposalId) -> Result<()> {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        if proposal.status != ProposalStatus::Pending {
            return Err(GovernanceError::InvalidStatus {
                expected: ProposalStatus::Pending.as_str().to_string(),
                found: proposal.status.as_str().to_string(),
            });
        }
        if proposal.flagged {
            return Err(GovernanceError::ProposalFlagged(id));
        }
        proposal.flagged = true;
        Ok(())
    }

    /// Undoes a failed execution: `Executed` back to `Passed`.
    pub async fn revert_execution(&self, id: ProposalId) -> Result<()> {
        let mut state = self.state.write().await;
        let proposal = state
            .proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        if proposal.status != ProposalStatus::Executed {
            return Err(GovernanceError::InvalidStatus {
                expected: ProposalStatus::Executed.as_str().to_string(),
                found: proposal.status.as_str().to_string(),
            });
        }
        proposal.status = ProposalStatus::Passed;
        Ok(())
    }

    /// Stores a vote and adds its weight to the tally, atomically.
    pub async fn record_vote(&self, record: VoteRecord) -> Result<Proposal> {
        let mut state = self.state.write().await;
        let key = (record.proposal_id, record.voter);
        if state.votes.contains_key(&key) {
            return Err(GovernanceError::DuplicateVote {
                proposal_id: record.proposal_id,
                voter: record.voter,
            });
        }

        let proposal = state
            .proposals
            .get_mut(&record.proposal_id)
            .ok_or(GovernanceError::ProposalNotFound(record.proposal_id))?;
        if proposal.status != ProposalStatus::Active {
            return Err(GovernanceError::InvalidStatus {
                expected: ProposalStatus::Active.as_str().to_string(),
                found: proposal.status.as_str().to_string(),
            });
        }
        let bucket = match record.choice {
            VoteChoice::For => &mut proposal.for_votes,
            VoteChoice::Against => &mut proposal.against_votes,
            VoteChoice::Abstain => &mut proposal.abstain_votes,
        };
        *bucket = bucket
            .checked_add(record.weight)
            .ok_or(GovernanceError::LedgerOverflow)?;
        let updated = proposal.clone();

        state.votes.insert(key, record);
        Ok(updated)
    }

    pub async fn has_voted(&self, id: ProposalId, voter: &Principal) -> bool {
        self.state.read().await.votes.contains_key(&(id, *voter))
    }

    pub async fn vote_record(&self, id: ProposalId, voter: &Principal) -> Option<VoteRecord> {
        self.state.read().await.votes.get(&(id, *voter)).cloned()
    }

    /// Votes on `id` ordered by cast time, then voter
    pub async fn votes_for(&self, id: ProposalId) -> Vec<VoteRecord> {
        let mut votes: Vec<VoteRecord> = self
            .state
            .read()
            .await
            .votes
            .values()
            .filter(|v| v.proposal_id == id)
            .cloned()
            .collect();
        votes.sort_by_key(|v| (v.cast_at, v.voter));
        votes
    }

    pub async fn proposer_history(&self, proposer: &Principal) -> Vec<ProposalId> {
        self.state
            .read()
            .await
            .proposer_history
            .get(proposer)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn count(&self) -> u64 {
        self.state.read().await.proposals.len() as u64
    }

    pub async fn by_status(&self, status: ProposalStatus) -> Vec<Proposal> {
        self.state
            .read()
            .await
            .proposals
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProposalMetadata;
    use chrono::Utc;
    use grant_types::FundAmount;

    fn draft(id: ProposalId, proposer: Principal) -> Proposal {
        let now = Utc::now();
        Proposal {
            id,
            proposer,
            recipient: Principal::from_tag(0xbb),
            amount: FundAmount::from_units(1),
            created_at: now,
            vote_start: now,
            vote_end: now,
            execution_time: now,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            status: ProposalStatus::Pending,
            flagged: false,
            metadata: ProposalMetadata::new("t", ""),
        }
    }

    fn vote(id: ProposalId, voter: Principal, choice: VoteChoice, weight: u128) -> VoteRecord {
        VoteRecord {
            proposal_id: id,
            voter,
            choice,
            weight,
            cast_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential_from_one() {
        let registry = ProposalRegistry::new();
        let alice = Principal::from_tag(1);
        let bob = Principal::from_tag(2);

        for expected in 1..=5u64 {
            let who = if expected % 2 == 0 { bob } else { alice };
            let p = registry.insert_with(|id| draft(id, who)).await;
            assert_eq!(p.id, expected);
        }
        assert_eq!(registry.count().await, 5);
        assert_eq!(registry.proposer_history(&alice).await, vec![1, 3, 5]);
        assert_eq!(registry.proposer_history(&bob).await, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_terminal_proposals_cannot_transition() {
        let registry = ProposalRegistry::new();
        let p = registry
            .insert_with(|id| draft(id, Principal::from_tag(1)))
            .await;

        registry
            .transition(p.id, ProposalStatus::Cancelled, |_| {})
            .await
            .unwrap();
        for next in [
            ProposalStatus::Pending,
            ProposalStatus::Active,
            ProposalStatus::Cancelled,
        ] {
            assert!(registry.transition(p.id, next, |_| {}).await.is_err());
        }
        assert!(registry.set_flagged(p.id).await.is_err());
        assert!(registry.revert_execution(p.id).await.is_err());
        assert_eq!(
            registry.get(p.id).await.unwrap().status,
            ProposalStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_votes_are_recorded_once() {
        let registry = ProposalRegistry::new();
        let p = registry
            .insert_with(|id| draft(id, Principal::from_tag(1)))
            .await;
        let voter = Principal::from_tag(9);

        // Not active yet
        assert!(registry
            .record_vote(vote(p.id, voter, VoteChoice::For, 5))
            .await
            .is_err());

        registry
            .transition(p.id, ProposalStatus::Active, |_| {})
            .await
            .unwrap();
        let updated = registry
            .record_vote(vote(p.id, voter, VoteChoice::For, 5))
            .await
            .unwrap();
        assert_eq!(updated.for_votes, 5);

        let err = registry
            .record_vote(vote(p.id, voter, VoteChoice::Against, 7))
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::DuplicateVote { .. }));

        let current = registry.get(p.id).await.unwrap();
        assert_eq!((current.for_votes, current.against_votes), (5, 0));
        assert!(registry.has_voted(p.id, &voter).await);
        assert_eq!(
            registry.vote_record(p.id, &voter).await.unwrap().choice,
            VoteChoice::For
        );
        assert_eq!(registry.votes_for(p.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_flag_is_one_way() {
        let registry = ProposalRegistry::new();
        let p = registry
            .insert_with(|id| draft(id, Principal::from_tag(1)))
            .await;

        registry.set_flagged(p.id).await.unwrap();
        assert_eq!(
            registry.set_flagged(p.id).await,
            Err(GovernanceError::ProposalFlagged(p.id))
        );
        assert!(registry.get(p.id).await.unwrap().flagged);
    }

    #[tokio::test]
    async fn test_by_status() {
        let registry = ProposalRegistry::new();
        for _ in 0..3 {
            registry
                .insert_with(|id| draft(id, Principal::from_tag(1)))
                .await;
        }
        registry
            .transition(2, ProposalStatus::Active, |_| {})
            .await
            .unwrap();

        assert_eq!(registry.by_status(ProposalStatus::Pending).await.len(), 2);
        let active = registry.by_status(ProposalStatus::Active).await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, 2);
    }
}
