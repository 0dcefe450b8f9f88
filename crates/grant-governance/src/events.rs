//! Audit trail of governance mutations
//!
//! Every successful mutating call appends exactly one record per action.
//! Rejected calls append nothing. Observers either read the log or
//! subscribe to the live broadcast.

use crate::clock::Clock;
use crate::types::{ProposalStatus, Role, VoteChoice};
use chrono::{DateTime, Utc};
use grant_types::{FundAmount, Principal, ProposalId, Weight};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Events buffered per subscriber before the slowest one starts lagging
const EVENT_BUFFER: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GovernanceEvent {
    ProposalCreated {
        id: ProposalId,
        proposer: Principal,
        recipient: Principal,
        amount: FundAmount,
        title: String,
        category: String,
    },
    ProposalActivated {
        id: ProposalId,
        #[serde(with = "chrono::serde::ts_seconds")]
        vote_start: DateTime<Utc>,
        #[serde(with = "chrono::serde::ts_seconds")]
        vote_end: DateTime<Utc>,
    },
    VoteCast {
        proposal_id: ProposalId,
        voter: Principal,
        choice: VoteChoice,
        weight: Weight,
    },
    ProposalFinalized {
        id: ProposalId,
        status: ProposalStatus,
    },
    ProposalExecuted {
        id: ProposalId,
        recipient: Principal,
        amount: FundAmount,
    },
    ProposalCancelled {
        id: ProposalId,
        cancelled_by: Principal,
    },
    ProposalFlagged {
        id: ProposalId,
        curator: Principal,
        reason: String,
    },
    ConfigUpdated {
        param_name: String,
        new_value: String,
    },
    FundsDeposited {
        from: Principal,
        amount: FundAmount,
        note: String,
    },
    GrantDisbursed {
        recipient: Principal,
        amount: FundAmount,
        proposal_id: ProposalId,
    },
    EmergencyWithdraw {
        to: Principal,
        amount: FundAmount,
    },
    RoleGranted {
        role: Role,
        account: Principal,
        granted_by: Principal,
    },
    RoleRevoked {
        role: Role,
        account: Principal,
        revoked_by: Principal,
    },
    Paused {
        by: Principal,
    },
    Unpaused {
        by: Principal,
    },
}

impl GovernanceEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            GovernanceEvent::ProposalCreated { .. } => "proposal.created",
            GovernanceEvent::ProposalActivated { .. } => "proposal.activated",
            GovernanceEvent::VoteCast { .. } => "vote.cast",
            GovernanceEvent::ProposalFinalized { .. } => "proposal.finalized",
            GovernanceEvent::ProposalExecuted { .. } => "proposal.executed",
            GovernanceEvent::ProposalCancelled { .. } => "proposal.cancelled",
            GovernanceEvent::ProposalFlagged { .. } => "proposal.flagged",
            GovernanceEvent::ConfigUpdated { .. } => "config.updated",
            GovernanceEvent::FundsDeposited { .. } => "treasury.deposit",
            GovernanceEvent::GrantDisbursed { .. } => "treasury.disbursed",
            GovernanceEvent::EmergencyWithdraw { .. } => "treasury.emergency_withdraw",
            GovernanceEvent::RoleGranted { .. } => "role.granted",
            GovernanceEvent::RoleRevoked { .. } => "role.revoked",
            GovernanceEvent::Paused { .. } => "governance.paused",
            GovernanceEvent::Unpaused { .. } => "governance.unpaused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub event: GovernanceEvent,
}

/// Append-only event log shared by all governance components
pub struct EventLog {
    clock: Arc<dyn Clock>,
    records: Arc<RwLock<Vec<EventRecord>>>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            clock,
            records: Arc::new(RwLock::new(Vec::new())),
            sender,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn emit(&self, event: GovernanceEvent) -> u64 {
        let mut records = self.records.write().await;
        let record = EventRecord {
            seq: records.len() as u64 + 1,
            timestamp: self.clock.now(),
            event,
        };
        let seq = record.seq;
        debug!(seq, event_type = record.event.event_type(), "📝 Event recorded");
        // No subscribers is fine
        let _ = self.sender.send(record.clone());
        records.push(record);
        seq
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub async fn records(&self) -> Vec<EventRecord> {
        self.records.read().await.clone()
    }

    pub async fn since(&self, seq: u64) -> Vec<EventRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.seq > seq)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn last(&self) -> Option<EventRecord> {
        self.records.read().await.last().cloned()
    }
}
