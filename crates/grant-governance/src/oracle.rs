//! Collaborators living outside the governance core.

use async_trait::async_trait;
use grant_types::{FundAmount, Principal, Weight};

/// Live view of the weighting token.
#[async_trait]
pub trait WeightOracle: Send + Sync {
    /// Voting power of `who` right now. Not snapshotted.
    async fn current_weight(&self, who: &Principal) -> Weight;

    async fn total_supply(&self) -> Weight;
}

/// Value-transfer primitive used by the treasury.
///
/// Implementations may call back into the governance system before
/// returning.
#[async_trait]
pub trait FundsTransfer: Send + Sync {
    async fn transfer(&self, to: Principal, amount: FundAmount) -> Result<(), String>;
}
