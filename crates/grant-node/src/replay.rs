//! Scripted governance sessions against in-memory collaborators
//!
//! A script seeds voting weights and then runs a list of operations in
//! order. Every operation is reported with the events it produced, or
//! with the class and message of the error that rejected it.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use grant_governance::{
    ErrorKind, EventRecord, GovernanceError, GovernanceSystem, ManualClock, MemoryBank,
    MemoryWeightOracle, ParamKey, Proposal, ProposalMetadata, Role, SystemBuilder, TreasuryStats,
    VoteChoice,
};
use grant_types::{FundAmount, Principal, ProposalId, Weight};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayScript {
    /// Clock reading when the session starts
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Initial voting weights keyed by hex principal
    #[serde(default)]
    pub weights: HashMap<String, Weight>,
    /// Fixed total supply instead of the sum of weights
    #[serde(default)]
    pub total_supply: Option<Weight>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Deposit {
        from: Principal,
        amount: FundAmount,
        #[serde(default)]
        note: String,
    },
    Create {
        proposer: Principal,
        recipient: Principal,
        amount: FundAmount,
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        category: String,
        #[serde(default)]
        content_ref: String,
    },
    Activate {
        id: ProposalId,
    },
    Flag {
        curator: Principal,
        id: ProposalId,
        #[serde(default)]
        reason: String,
    },
    Vote {
        voter: Principal,
        id: ProposalId,
        choice: VoteChoice,
    },
    Finalize {
        id: ProposalId,
    },
    Execute {
        id: ProposalId,
    },
    Cancel {
        caller: Principal,
        id: ProposalId,
    },
    Advance {
        secs: i64,
    },
    SetWeight {
        who: Principal,
        #[serde(with = "weight_string")]
        weight: Weight,
    },
    GrantRole {
        caller: Principal,
        role: Role,
        account: Principal,
    },
    RevokeRole {
        caller: Principal,
        role: Role,
        account: Principal,
    },
    Pause {
        caller: Principal,
    },
    Unpause {
        caller: Principal,
    },
    SetParam {
        caller: Principal,
        param: ParamKey,
        value: String,
    },
    EmergencyWithdraw {
        caller: Principal,
        to: Principal,
        amount: FundAmount,
    },
    FailTransfers {
        failing: bool,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Deposit { .. } => "deposit",
            Step::Create { .. } => "create",
            Step::Activate { .. } => "activate",
            Step::Flag { .. } => "flag",
            Step::Vote { .. } => "vote",
            Step::Finalize { .. } => "finalize",
            Step::Execute { .. } => "execute",
            Step::Cancel { .. } => "cancel",
            Step::Advance { .. } => "advance",
            Step::SetWeight { .. } => "set_weight",
            Step::GrantRole { .. } => "grant_role",
            Step::RevokeRole { .. } => "revoke_role",
            Step::Pause { .. } => "pause",
            Step::Unpause { .. } => "unpause",
            Step::SetParam { .. } => "set_param",
            Step::EmergencyWithdraw { .. } => "emergency_withdraw",
            Step::FailTransfers { .. } => "fail_transfers",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<StepOutcome>,
    pub treasury: TreasuryStats,
    pub proposals: Vec<Proposal>,
}

/// Final state printed after the step lines
#[derive(Debug, Serialize)]
pub struct ReplaySummary<'a> {
    pub treasury: &'a TreasuryStats,
    pub proposals: &'a [Proposal],
}

impl ReplayReport {
    pub fn rejected(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }

    pub fn summary(&self) -> ReplaySummary<'_> {
        ReplaySummary {
            treasury: &self.treasury,
            proposals: &self.proposals,
        }
    }
}

/// Weights inside tagged steps travel as decimal strings so they keep the full u128 range
mod weight_string {
    use grant_types::Weight;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(weight: &Weight, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(weight)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Weight, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| de::Error::custom(format!("invalid weight '{}'", raw)))
    }
}

impl ReplayScript {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid script: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

struct Session {
    system: GovernanceSystem,
    oracle: Arc<MemoryWeightOracle>,
    bank: Arc<MemoryBank>,
    clock: Arc<ManualClock>,
}

async fn bootstrap(config: &NodeConfig, script: &ReplayScript) -> Result<Session> {
    let params = config.governance_params()?;
    let roles = config.resolve_roles()?;

    let oracle = Arc::new(MemoryWeightOracle::new());
    for (hex, weight) in &script.weights {
        let who = Principal::from_hex(hex)
            .with_context(|| format!("Invalid principal in weights: {}", hex))?;
        oracle.set_weight(who, *weight).await;
    }
    oracle.set_total_supply(script.total_supply).await;

    let bank = Arc::new(MemoryBank::new());
    let start = match script.start {
        Some(at) => at,
        None => Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .context("Invalid default start time")?,
    };
    let clock = Arc::new(ManualClock::new(start));

    let mut builder = SystemBuilder::new(
        roles.super_admin,
        oracle.clone(),
        bank.clone(),
        clock.clone(),
    )
    .with_params(params);
    if let Some(engine) = roles.engine {
        builder = builder.with_engine_principal(engine);
    }
    let system = builder.build().await?;

    for admin in &roles.admins {
        system
            .access
            .grant_role(&roles.super_admin, Role::Admin, *admin)
            .await?;
    }
    for curator in &roles.curators {
        system
            .access
            .grant_role(&roles.super_admin, Role::Curator, *curator)
            .await?;
    }
    if !config.treasury.initial_deposit.is_zero() {
        system
            .treasury
            .deposit(
                roles.super_admin,
                config.treasury.initial_deposit,
                config.treasury.note.clone(),
            )
            .await?;
    }

    Ok(Session {
        system,
        oracle,
        bank,
        clock,
    })
}

/// Run `script` on a fresh in-memory governance system built from `config`.
pub async fn run_replay(config: &NodeConfig, script: &ReplayScript) -> Result<ReplayReport> {
    let session = bootstrap(config, script).await?;
    let mut outcomes = Vec::with_capacity(script.steps.len());

    for (index, step) in script.steps.iter().enumerate() {
        let before = session.system.events.len().await as u64;
        let result = apply_step(&session, step)
            .await
            .with_context(|| format!("Step {} ({}) is malformed", index, step.name()))?;
        let events = session.system.events.since(before).await;

        let outcome = match result {
            Ok(()) => StepOutcome {
                step: index,
                op: step.name(),
                ok: true,
                error_kind: None,
                error: None,
                events,
            },
            Err(e) => StepOutcome {
                step: index,
                op: step.name(),
                ok: false,
                error_kind: Some(e.kind()),
                error: Some(e.to_string()),
                events,
            },
        };
        debug!(step = index, op = outcome.op, ok = outcome.ok, "Step applied");
        outcomes.push(outcome);
    }

    let mut proposals = Vec::new();
    for id in 1..=session.system.engine.proposal_count().await {
        proposals.push(session.system.engine.get_proposal(id).await?);
    }

    let report = ReplayReport {
        outcomes,
        treasury: session.system.treasury.stats().await,
        proposals,
    };
    info!(
        steps = report.outcomes.len(),
        rejected = report.rejected(),
        balance = %report.treasury.balance,
        "🏁 Replay finished"
    );
    Ok(report)
}

/// Outer error: the step itself is malformed. Inner error: governance rejected it.
async fn apply_step(
    session: &Session,
    step: &Step,
) -> Result<std::result::Result<(), GovernanceError>> {
    let system = &session.system;
    let engine = &system.engine;

    let result = match step.clone() {
        Step::Deposit { from, amount, note } => {
            system.treasury.deposit(from, amount, note).await
        }
        Step::Create {
            proposer,
            recipient,
            amount,
            title,
            description,
            category,
            content_ref,
        } => {
            let metadata = ProposalMetadata::new(title, description)
                .with_category(category)
                .with_content_ref(content_ref);
            engine
                .create_proposal(proposer, recipient, amount, metadata)
                .await
                .map(|_| ())
        }
        Step::Activate { id } => engine.activate_voting(id).await,
        Step::Flag {
            curator,
            id,
            reason,
        } => engine.flag_proposal(&curator, id, reason).await,
        Step::Vote { voter, id, choice } => engine.cast_vote(voter, id, choice).await.map(|_| ()),
        Step::Finalize { id } => engine.finalize_proposal(id).await.map(|_| ()),
        Step::Execute { id } => engine.execute_proposal(id).await,
        Step::Cancel { caller, id } => engine.cancel_proposal(&caller, id).await,
        Step::Advance { secs } => {
            if secs < 0 {
                anyhow::bail!("clock cannot move backwards ({}s)", secs);
            }
            session.clock.advance_secs(secs);
            Ok(())
        }
        Step::SetWeight { who, weight } => {
            session.oracle.set_weight(who, weight).await;
            Ok(())
        }
        Step::GrantRole {
            caller,
            role,
            account,
        } => system.access.grant_role(&caller, role, account).await.map(|_| ()),
        Step::RevokeRole {
            caller,
            role,
            account,
        } => system
            .access
            .revoke_role(&caller, role, account)
            .await
            .map(|_| ()),
        Step::Pause { caller } => system.access.pause(&caller).await,
        Step::Unpause { caller } => system.access.unpause(&caller).await,
        Step::SetParam {
            caller,
            param,
            value,
        } => set_param(system, &caller, param, &value).await?,
        Step::EmergencyWithdraw { caller, to, amount } => {
            system.treasury.emergency_withdraw(&caller, to, amount).await
        }
        Step::FailTransfers { failing } => {
            session.bank.set_failing(failing);
            Ok(())
        }
    };
    Ok(result)
}

async fn set_param(
    system: &GovernanceSystem,
    caller: &Principal,
    param: ParamKey,
    value: &str,
) -> Result<std::result::Result<(), GovernanceError>> {
    let config = &system.config;
    let invalid = || format!("Invalid value '{}' for {}", value, param.name());
    let result = match param {
        ParamKey::VotingDelay => {
            config
                .set_voting_delay(caller, value.parse().with_context(invalid)?)
                .await
        }
        ParamKey::VotingPeriod => {
            config
                .set_voting_period(caller, value.parse().with_context(invalid)?)
                .await
        }
        ParamKey::TimelockDelay => {
            config
                .set_timelock_delay(caller, value.parse().with_context(invalid)?)
                .await
        }
        ParamKey::QuorumPercentage => {
            config
                .set_quorum_percentage(caller, value.parse().with_context(invalid)?)
                .await
        }
        ParamKey::MaxGrantAmount => {
            let amount: FundAmount = value.parse().with_context(invalid)?;
            config.set_max_grant_amount(caller, amount).await
        }
        ParamKey::ProposalThreshold => {
            config
                .set_proposal_threshold(caller, value.parse().with_context(invalid)?)
                .await
        }
    };
    Ok(result)
}
