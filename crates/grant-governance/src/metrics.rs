//! Prometheus metrics for grant governance
//!
//! Tracks proposal lifecycle, voting, treasury flows and rejected calls.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

/// Proposal lifecycle transitions
pub static PROPOSAL_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grant_governance_proposal_transitions_total",
        "Total proposal lifecycle transitions",
        &["from_status", "to_status"]
    )
    .unwrap()
});

/// Proposals created
pub static PROPOSALS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grant_governance_proposals_created_total",
        "Total grant proposals created",
        &["category"]
    )
    .unwrap()
});

/// Vote counts
pub static VOTES_CAST: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grant_governance_votes_cast_total",
        "Total votes cast",
        &["choice"]
    )
    .unwrap()
});

/// Vote weight distribution (log scale)
pub static VOTE_WEIGHT: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "grant_governance_vote_weight",
        "Weight carried by individual votes",
        &["choice"],
        vec![1.0, 10.0, 100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]
    )
    .unwrap()
});

/// Treasury operations
pub static TREASURY_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grant_governance_treasury_operations_total",
        "Total treasury operations",
        &["operation", "outcome"]
    )
    .unwrap()
});

/// Treasury balance in whole fund units (truncated)
pub static TREASURY_BALANCE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "grant_governance_treasury_balance_units",
        "Current treasury balance in whole fund units"
    )
    .unwrap()
});

/// Rejected calls by operation and error class
pub static REJECTED_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grant_governance_rejected_operations_total",
        "Total rejected governance calls",
        &["operation", "kind"]
    )
    .unwrap()
});

/// Config parameter updates
pub static CONFIG_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grant_governance_config_updates_total",
        "Total config parameter updates",
        &["param"]
    )
    .unwrap()
});
