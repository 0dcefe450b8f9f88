use crate::types::Role;
use grant_types::{FundAmount, Principal, ProposalId, Weight};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Governance operation result type
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Coarse classification of a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    Authorization,
    State,
    InsufficientFunds,
    TransferFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::State => "state",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::TransferFailure => "transfer_failure",
        }
    }
}

/// Governance errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    // ---- validation ----
    #[error("Recipient must not be the null principal")]
    NullRecipient,

    #[error("Role holder must not be the null principal")]
    NullPrincipal,

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Amount {amount} exceeds maximum grant {max}")]
    AmountExceedsCap { amount: FundAmount, max: FundAmount },

    #[error("Invalid metadata field {field}: {reason}")]
    InvalidMetadata { field: &'static str, reason: String },

    #[error("Parameter value out of range: {param} = {value} (range: {range})")]
    ParameterOutOfRange {
        param: String,
        value: String,
        range: String,
    },

    #[error("Ledger arithmetic overflow")]
    LedgerOverflow,

    // ---- authorization ----
    #[error("Insufficient voting weight: required {required}, actual {actual}")]
    InsufficientWeight { required: Weight, actual: Weight },

    #[error("Principal {principal} lacks role {role:?}")]
    MissingRole { principal: Principal, role: Role },

    #[error("Caller {0} is neither the proposer nor a curator")]
    NotProposerOrCurator(Principal),

    #[error("Principal {0} has no voting weight")]
    NoVotingWeight(Principal),

    // ---- state ----
    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("Proposal in wrong status: expected {expected}, found {found}")]
    InvalidStatus { expected: String, found: String },

    #[error("Proposal {0} is flagged")]
    ProposalFlagged(ProposalId),

    #[error("Voting has not started: opens at {starts_at}")]
    VotingNotStarted { starts_at: i64 },

    #[error("Voting period has ended at {ended_at}")]
    VotingClosed { ended_at: i64 },

    #[error("Voting period has not ended: closes at {ends_at}")]
    VotingNotEnded { ends_at: i64 },

    #[error("Timelock not expired: {remaining_secs}s remaining")]
    TimelockNotExpired { remaining_secs: i64 },

    #[error("Duplicate vote from {voter} on proposal {proposal_id}")]
    DuplicateVote {
        proposal_id: ProposalId,
        voter: Principal,
    },

    #[error("Governance is paused")]
    Paused,

    #[error("Pause flag already set to {0}")]
    PauseUnchanged(bool),

    #[error("Reentrant call into treasury disbursement")]
    ReentrantCall,

    // ---- funds ----
    #[error("Insufficient treasury funds: required {required}, available {available}")]
    InsufficientFunds {
        required: FundAmount,
        available: FundAmount,
    },

    #[error("Fund transfer failed: {0}")]
    TransferFailed(String),
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        use GovernanceError::*;
        match self {
            NullRecipient
            | NullPrincipal
            | ZeroAmount
            | AmountExceedsCap { .. }
            | InvalidMetadata { .. }
            | ParameterOutOfRange { .. }
            | LedgerOverflow => ErrorKind::Validation,

            InsufficientWeight { .. }
            | MissingRole { .. }
            | NotProposerOrCurator(_)
            | NoVotingWeight(_) => ErrorKind::Authorization,

            ProposalNotFound(_)
            | InvalidStatus { .. }
            | ProposalFlagged(_)
            | VotingNotStarted { .. }
            | VotingClosed { .. }
            | VotingNotEnded { .. }
            | TimelockNotExpired { .. }
            | DuplicateVote { .. }
            | Paused
            | PauseUnchanged(_)
            | ReentrantCall => ErrorKind::State,

            InsufficientFunds { .. } => ErrorKind::InsufficientFunds,

            TransferFailed(_) => ErrorKind::TransferFailure,
        }
    }
}
