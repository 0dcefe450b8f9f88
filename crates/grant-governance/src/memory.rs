//! In-memory collaborators for local runs and tests.

use crate::oracle::{FundsTransfer, WeightOracle};
use async_trait::async_trait;
use grant_types::{FundAmount, Principal, Weight};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Weight table keyed by principal.
///
/// Total supply is the sum of all balances unless overridden.
#[derive(Debug, Default)]
pub struct MemoryWeightOracle {
    weights: Arc<RwLock<HashMap<Principal, Weight>>>,
    supply_override: Arc<RwLock<Option<Weight>>>,
}

impl MemoryWeightOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_weight(&self, who: Principal, weight: Weight) {
        self.weights.write().await.insert(who, weight);
    }

    pub async fn set_total_supply(&self, supply: Option<Weight>) {
        *self.supply_override.write().await = supply;
    }
}

#[async_trait]
impl WeightOracle for MemoryWeightOracle {
    async fn current_weight(&self, who: &Principal) -> Weight {
        self.weights.read().await.get(who).copied().unwrap_or(0)
    }

    async fn total_supply(&self) -> Weight {
        if let Some(supply) = *self.supply_override.read().await {
            return supply;
        }
        self.weights
            .read()
            .await
            .values()
            .fold(0u128, |acc, w| acc.saturating_add(*w))
    }
}

/// Records every transfer it receives; can be switched to refuse them.
#[derive(Debug, Default)]
pub struct MemoryBank {
    received: Arc<RwLock<HashMap<Principal, FundAmount>>>,
    transfers: Arc<RwLock<Vec<(Principal, FundAmount)>>>,
    failing: AtomicBool,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn received_by(&self, who: &Principal) -> FundAmount {
        self.received
            .read()
            .await
            .get(who)
            .copied()
            .unwrap_or(FundAmount::ZERO)
    }

    pub async fn transfers(&self) -> Vec<(Principal, FundAmount)> {
        self.transfers.read().await.clone()
    }
}

#[async_trait]
impl FundsTransfer for MemoryBank {
    async fn transfer(&self, to: Principal, amount: FundAmount) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(format!("recipient {} rejected transfer", to.short()));
        }
        let mut received = self.received.write().await;
        let entry = received.entry(to).or_insert(FundAmount::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| "recipient balance overflow".to_string())?;
        drop(received);

        self.transfers.write().await.push((to, amount));
        debug!(to = %to.short(), amount = %amount, "💸 Transfer delivered");
        Ok(())
    }
}
