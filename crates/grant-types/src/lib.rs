pub mod amount;
pub mod principal;

pub use amount::{AmountParseError, FundAmount, FUND_BASE_UNIT, FUND_DECIMALS};
pub use principal::Principal;

/// Stake-derived voting power as reported by the weighting token.
pub type Weight = u128;

/// Sequential proposal identifier, first value 1.
pub type ProposalId = u64;
