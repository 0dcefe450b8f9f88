use crate::access::AccessControlRegistry;
use crate::events::{EventLog, GovernanceEvent};
use crate::types::Role;
use crate::{GovernanceError, Result};
use chrono::{DateTime, Utc};
use grant_types::{FundAmount, Principal, Weight};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

pub const VOTING_DELAY_RANGE: (u64, u64) = (HOUR, 7 * DAY);
pub const VOTING_PERIOD_RANGE: (u64, u64) = (DAY, 30 * DAY);
pub const TIMELOCK_DELAY_RANGE: (u64, u64) = (HOUR, 14 * DAY);
pub const QUORUM_PERCENTAGE_RANGE: (u8, u8) = (1, 50);

/// Maximum number of parameter change subscribers
const MAX_SUBSCRIBERS: usize = 100;

/// Adjustable governance parameters. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    pub voting_delay_secs: u64,
    pub voting_period_secs: u64,
    pub timelock_delay_secs: u64,
    pub quorum_percentage: u8,
    pub max_grant_amount: FundAmount,
    pub proposal_threshold: Weight,
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            voting_delay_secs: DAY,
            voting_period_secs: 5 * DAY,
            timelock_delay_secs: 2 * DAY,
            quorum_percentage: 10,
            max_grant_amount: FundAmount::from_units(5),
            proposal_threshold: 10,
        }
    }
}

impl GovernanceParams {
    pub fn validate(&self) -> Result<()> {
        check_range(ParamKey::VotingDelay, self.voting_delay_secs, VOTING_DELAY_RANGE)?;
        check_range(ParamKey::VotingPeriod, self.voting_period_secs, VOTING_PERIOD_RANGE)?;
        check_range(ParamKey::TimelockDelay, self.timelock_delay_secs, TIMELOCK_DELAY_RANGE)?;
        check_range(
            ParamKey::QuorumPercentage,
            self.quorum_percentage,
            QUORUM_PERCENTAGE_RANGE,
        )?;
        check_max_grant(self.max_grant_amount)?;
        Ok(())
    }

    fn value_of(&self, key: ParamKey) -> String {
        match key {
            ParamKey::VotingDelay => self.voting_delay_secs.to_string(),
            ParamKey::VotingPeriod => self.voting_period_secs.to_string(),
            ParamKey::TimelockDelay => self.timelock_delay_secs.to_string(),
            ParamKey::QuorumPercentage => self.quorum_percentage.to_string(),
            ParamKey::MaxGrantAmount => self.max_grant_amount.to_decimal_string(),
            ParamKey::ProposalThreshold => self.proposal_threshold.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    VotingDelay,
    VotingPeriod,
    TimelockDelay,
    QuorumPercentage,
    MaxGrantAmount,
    ProposalThreshold,
}

impl ParamKey {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKey::VotingDelay => "votingDelay",
            ParamKey::VotingPeriod => "votingPeriod",
            ParamKey::TimelockDelay => "timelockDelay",
            ParamKey::QuorumPercentage => "quorumPercentage",
            ParamKey::MaxGrantAmount => "maxGrantAmount",
            ParamKey::ProposalThreshold => "proposalThreshold",
        }
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    key: ParamKey,
    value: T,
    (min, max): (T, T),
) -> Result<()> {
    if value < min || value > max {
        return Err(GovernanceError::ParameterOutOfRange {
            param: key.name().to_string(),
            value: value.to_string(),
            range: format!("{}..={}", min, max),
        });
    }
    Ok(())
}

fn check_max_grant(amount: FundAmount) -> Result<()> {
    if amount.is_zero() {
        return Err(GovernanceError::ParameterOutOfRange {
            param: ParamKey::MaxGrantAmount.name().to_string(),
            value: amount.to_decimal_string(),
            range: "> 0".to_string(),
        });
    }
    Ok(())
}

/// Parameter change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub key: ParamKey,
    pub old_value: String,
    pub new_value: String,
    pub changed_by: Principal,
    pub changed_at: DateTime<Utc>,
}

/// Admin-gated, range-checked parameter store
pub struct ConfigStore {
    params: Arc<RwLock<GovernanceParams>>,
    history: Arc<RwLock<Vec<ParameterChange>>>,
    access: Arc<AccessControlRegistry>,
    events: Arc<EventLog>,
    change_tx: broadcast::Sender<ParameterChange>,
}

impl ConfigStore {
    pub fn new(access: Arc<AccessControlRegistry>, events: Arc<EventLog>) -> Self {
        let (change_tx, _) = broadcast::channel(MAX_SUBSCRIBERS);
        Self {
            params: Arc::new(RwLock::new(GovernanceParams::default())),
            history: Arc::new(RwLock::new(Vec::new())),
            access,
            events,
            change_tx,
        }
    }

    /// Start from non-default parameters, validated against the same bounds as the setters
    pub fn with_params(mut self, params: GovernanceParams) -> Result<Self> {
        params.validate()?;
        self.params = Arc::new(RwLock::new(params));
        Ok(self)
    }

    pub async fn get(&self) -> GovernanceParams {
        self.params.read().await.clone()
    }

    pub async fn history(&self) -> Vec<ParameterChange> {
        self.history.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParameterChange> {
        self.change_tx.subscribe()
    }

    pub async fn set_voting_delay(&self, caller: &Principal, secs: u64) -> Result<()> {
        self.access.require_role(Role::Admin, caller).await?;
        check_range(ParamKey::VotingDelay, secs, VOTING_DELAY_RANGE)?;
        self.apply(caller, ParamKey::VotingDelay, |p| p.voting_delay_secs = secs)
            .await
    }

    pub async fn set_voting_period(&self, caller: &Principal, secs: u64) -> Result<()> {
        self.access.require_role(Role::Admin, caller).await?;
        check_range(ParamKey::VotingPeriod, secs, VOTING_PERIOD_RANGE)?;
        self.apply(caller, ParamKey::VotingPeriod, |p| p.voting_period_secs = secs)
            .await
    }

    pub async fn set_timelock_delay(&self, caller: &Principal, secs: u64) -> Result<()> {
        self.access.require_role(Role::Admin, caller).await?;
        check_range(ParamKey::TimelockDelay, secs, TIMELOCK_DELAY_RANGE)?;
        self.apply(caller, ParamKey::TimelockDelay, |p| p.timelock_delay_secs = secs)
            .await
    }

    pub async fn set_quorum_percentage(&self, caller: &Principal, percentage: u8) -> Result<()> {
        self.access.require_role(Role::Admin, caller).await?;
        check_range(ParamKey::QuorumPercentage, percentage, QUORUM_PERCENTAGE_RANGE)?;
        self.apply(caller, ParamKey::QuorumPercentage, |p| {
            p.quorum_percentage = percentage
        })
        .await
    }

    pub async fn set_max_grant_amount(&self, caller: &Principal, amount: FundAmount) -> Result<()> {
        self.access.require_role(Role::Admin, caller).await?;
        check_max_grant(amount)?;
        self.apply(caller, ParamKey::MaxGrantAmount, |p| p.max_grant_amount = amount)
            .await
    }

    pub async fn set_proposal_threshold(
        &self,
        caller: &Principal,
        threshold: Weight,
    ) -> Result<()> {
        self.access.require_role(Role::Admin, caller).await?;
        self.apply(caller, ParamKey::ProposalThreshold, |p| {
            p.proposal_threshold = threshold
        })
        .await
    }

    async fn apply<F>(&self, caller: &Principal, key: ParamKey, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut GovernanceParams),
    {
        let mut params = self.params.write().await;
        let old_value = params.value_of(key);
        mutate(&mut params);
        let new_value = params.value_of(key);
        drop(params);

        let change = ParameterChange {
            key,
            old_value: old_value.clone(),
            new_value: new_value.clone(),
            changed_by: *caller,
            changed_at: self.events.now(),
        };
        self.history.write().await.push(change.clone());
        // Ignore send errors (no subscribers is ok)
        let _ = self.change_tx.send(change);

        self.events
            .emit(GovernanceEvent::ConfigUpdated {
                param_name: key.name().to_string(),
                new_value: new_value.clone(),
            })
            .await;

        crate::metrics::CONFIG_UPDATES
            .with_label_values(&[key.name()])
            .inc();

        info!(
            param = key.name(),
            old_value = %old_value,
            new_value = %new_value,
            by = %caller.short(),
            "⚙️ Parameter updated"
        );
        Ok(())
    }
}
