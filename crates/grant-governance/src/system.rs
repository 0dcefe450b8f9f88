use crate::access::AccessControlRegistry;
use crate::clock::Clock;
use crate::events::EventLog;
use crate::lifecycle::ProposalLifecycleManager;
use crate::oracle::{FundsTransfer, WeightOracle};
use crate::parameters::{ConfigStore, GovernanceParams};
use crate::registry::ProposalRegistry;
use crate::treasury::TreasuryLedger;
use crate::types::Role;
use crate::Result;
use grant_types::Principal;
use std::sync::Arc;
use tracing::info;

/// Fully wired governance stack sharing one event log and clock.
///
/// The lifecycle engine is registered as the treasury's executor at
/// bootstrap.
pub struct GovernanceSystem {
    pub access: Arc<AccessControlRegistry>,
    pub config: Arc<ConfigStore>,
    pub treasury: Arc<TreasuryLedger>,
    pub registry: Arc<ProposalRegistry>,
    pub events: Arc<EventLog>,
    pub clock: Arc<dyn Clock>,
    pub engine: Arc<ProposalLifecycleManager>,
}

pub struct SystemBuilder {
    super_admin: Principal,
    engine_principal: Principal,
    params: GovernanceParams,
    oracle: Arc<dyn WeightOracle>,
    bank: Arc<dyn FundsTransfer>,
    clock: Arc<dyn Clock>,
}

impl SystemBuilder {
    pub fn new(
        super_admin: Principal,
        oracle: Arc<dyn WeightOracle>,
        bank: Arc<dyn FundsTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            super_admin,
            engine_principal: default_engine_principal(),
            params: GovernanceParams::default(),
            oracle,
            bank,
            clock,
        }
    }

    pub fn with_params(mut self, params: GovernanceParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_engine_principal(mut self, principal: Principal) -> Self {
        self.engine_principal = principal;
        self
    }

    pub async fn build(self) -> Result<GovernanceSystem> {
        let events = Arc::new(EventLog::new(self.clock.clone()));
        let access = Arc::new(AccessControlRegistry::new(self.super_admin, events.clone())?);
        let config =
            Arc::new(ConfigStore::new(access.clone(), events.clone()).with_params(self.params)?);
        let treasury = Arc::new(TreasuryLedger::new(
            access.clone(),
            events.clone(),
            self.bank,
        ));
        let registry = Arc::new(ProposalRegistry::new());

        access
            .grant_role(&self.super_admin, Role::Executor, self.engine_principal)
            .await?;

        let engine = Arc::new(ProposalLifecycleManager::new(
            self.engine_principal,
            config.clone(),
            access.clone(),
            treasury.clone(),
            registry.clone(),
            self.oracle,
            self.clock.clone(),
            events.clone(),
        ));

        info!(
            super_admin = %self.super_admin.short(),
            executor = %self.engine_principal.short(),
            "✨ Governance system initialized"
        );

        Ok(GovernanceSystem {
            access,
            config,
            treasury,
            registry,
            events,
            clock: self.clock,
            engine,
        })
    }
}

/// Fixed identity of the lifecycle engine when none is configured
pub fn default_engine_principal() -> Principal {
    let mut bytes = [0xE5u8; 32];
    bytes[0] = 0x01;
    Principal::from_bytes(bytes)
}
