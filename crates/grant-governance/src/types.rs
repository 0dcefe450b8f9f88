use crate::{GovernanceError, Result};
use chrono::{DateTime, Utc};
use grant_types::{FundAmount, Principal, ProposalId, Weight};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// State machine vocabulary shared by lifecycle enums.
pub trait LifecycleState {
    fn is_terminal(&self) -> bool;
    fn can_transition_to(&self, next: &Self) -> bool;
}

/// Proposal lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Created, in review window before voting opens
    Pending,
    /// Voting open
    Active,
    /// Quorum and majority met, waiting for timelock
    Passed,
    /// Grant disbursed
    Executed,
    /// Quorum or majority missed
    Rejected,
    /// Withdrawn by proposer or curator
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Active => "Active",
            ProposalStatus::Passed => "Passed",
            ProposalStatus::Executed => "Executed",
            ProposalStatus::Rejected => "Rejected",
            ProposalStatus::Cancelled => "Cancelled",
        }
    }
}

impl LifecycleState for ProposalStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Rejected | Self::Cancelled)
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Passed)
                | (Active, Rejected)
                | (Active, Cancelled)
                | (Passed, Executed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::For => "for",
            VoteChoice::Against => "against",
            VoteChoice::Abstain => "abstain",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Grants and revokes every role
    SuperAdmin,
    /// Config mutation and pause
    Admin,
    /// Flags and cancels proposals
    Curator,
    /// The single principal allowed to trigger disbursement
    Executor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalMetadata {
    pub title: String,
    pub description: String,
    pub category: String,
    /// Off-system content reference (e.g. IPFS CID)
    pub content_ref: String,
}

impl ProposalMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: String::new(),
            content_ref: String::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_content_ref(mut self, content_ref: impl Into<String>) -> Self {
        self.content_ref = content_ref.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let title_len = self.title.chars().count();
        if title_len == 0 {
            return Err(GovernanceError::InvalidMetadata {
                field: "title",
                reason: "must not be empty".to_string(),
            });
        }
        if title_len > MAX_TITLE_CHARS {
            return Err(GovernanceError::InvalidMetadata {
                field: "title",
                reason: format!("{} chars exceeds {}", title_len, MAX_TITLE_CHARS),
            });
        }
        let description_len = self.description.chars().count();
        if description_len > MAX_DESCRIPTION_CHARS {
            return Err(GovernanceError::InvalidMetadata {
                field: "description",
                reason: format!("{} chars exceeds {}", description_len, MAX_DESCRIPTION_CHARS),
            });
        }
        Ok(())
    }
}

/// Grant proposal record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Principal,
    pub recipient: Principal,
    pub amount: FundAmount,
    pub created_at: DateTime<Utc>,
    pub vote_start: DateTime<Utc>,
    pub vote_end: DateTime<Utc>,
    pub execution_time: DateTime<Utc>,
    pub for_votes: Weight,
    pub against_votes: Weight,
    pub abstain_votes: Weight,
    pub status: ProposalStatus,
    pub flagged: bool,
    pub metadata: ProposalMetadata,
}

impl Proposal {
    pub fn total_votes(&self) -> Weight {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: ProposalId,
    pub voter: Principal,
    pub choice: VoteChoice,
    pub weight: Weight,
    pub cast_at: DateTime<Utc>,
}

/// Read-only tally view, recomputed on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStats {
    pub for_votes: Weight,
    pub against_votes: Weight,
    pub abstain_votes: Weight,
    pub total_votes: Weight,
    pub quorum_needed: Weight,
    pub quorum_reached: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryStats {
    pub balance: FundAmount,
    pub total_deposited: FundAmount,
    /// Governance disbursements plus emergency withdrawals
    pub total_disbursed: FundAmount,
    pub total_emergency_withdrawn: FundAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub from: Principal,
    pub amount: FundAmount,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutflowKind {
    Grant { proposal_id: ProposalId },
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutflowRecord {
    pub to: Principal,
    pub amount: FundAmount,
    pub kind: OutflowKind,
    pub timestamp: DateTime<Utc>,
}
