//! Vote tally and outcome rules
//!
//! Quorum is `floor(total_supply * quorum_percentage / 100)`; a proposal
//! passes when participation reaches quorum and FOR strictly exceeds
//! AGAINST. Abstentions count toward quorum only.

use crate::types::{Proposal, ProposalStatus, VoteStats};
use grant_types::Weight;

/// `floor(total_supply * percentage / 100)` without overflowing on large supplies.
pub fn quorum_needed(total_supply: Weight, percentage: u8) -> Weight {
    let pct = percentage as Weight;
    (total_supply / 100) * pct + (total_supply % 100) * pct / 100
}

pub fn tally(proposal: &Proposal, total_supply: Weight, quorum_percentage: u8) -> VoteStats {
    let total_votes = proposal.total_votes();
    let quorum_needed = quorum_needed(total_supply, quorum_percentage);
    VoteStats {
        for_votes: proposal.for_votes,
        against_votes: proposal.against_votes,
        abstain_votes: proposal.abstain_votes,
        total_votes,
        quorum_needed,
        quorum_reached: total_votes >= quorum_needed,
    }
}

/// Final status for a closed vote. Ties fail.
pub fn outcome(stats: &VoteStats) -> ProposalStatus {
    if stats.quorum_reached && stats.for_votes > stats.against_votes {
        ProposalStatus::Passed
    } else {
        ProposalStatus::Rejected
    }
}
