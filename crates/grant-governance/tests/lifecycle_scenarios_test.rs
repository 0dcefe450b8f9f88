use chrono::{TimeZone, Utc};
use grant_governance::{
    ErrorKind, GovernanceError, GovernanceEvent, GovernanceSystem, ManualClock, MemoryBank,
    MemoryWeightOracle, ProposalMetadata, ProposalStatus, Role, SystemBuilder, VoteChoice,
};
use grant_types::{FundAmount, Principal};
use std::sync::Arc;

const DAY: i64 = 86_400;

struct Harness {
    system: GovernanceSystem,
    oracle: Arc<MemoryWeightOracle>,
    bank: Arc<MemoryBank>,
    clock: Arc<ManualClock>,
    deployer: Principal,
    admin: Principal,
    curator: Principal,
}

impl Harness {
    async fn new() -> Self {
        let deployer = Principal::from_tag(0xd0);
        let admin = Principal::from_tag(0xad);
        let curator = Principal::from_tag(0xc0);

        let oracle = Arc::new(MemoryWeightOracle::new());
        oracle.set_weight(deployer, 1_000_000).await;
        let bank = Arc::new(MemoryBank::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));

        let system = SystemBuilder::new(deployer, oracle.clone(), bank.clone(), clock.clone())
            .build()
            .await
            .unwrap();
        system
            .access
            .grant_role(&deployer, Role::Admin, admin)
            .await
            .unwrap();
        system
            .access
            .grant_role(&deployer, Role::Curator, curator)
            .await
            .unwrap();
        system
            .treasury
            .deposit(deployer, FundAmount::from_units(10), "initial funding")
            .await
            .unwrap();

        Self {
            system,
            oracle,
            bank,
            clock,
            deployer,
            admin,
            curator,
        }
    }

    async fn member(&self, tag: u8, weight: u128) -> Principal {
        let p = Principal::from_tag(tag);
        self.oracle.set_weight(p, weight).await;
        p
    }

    async fn propose(
        &self,
        proposer: Principal,
        recipient: Principal,
        amount: FundAmount,
    ) -> u64 {
        self.system
            .engine
            .create_proposal(
                proposer,
                recipient,
                amount,
                ProposalMetadata::new("Community grant", "Fund the work").with_category("dev"),
            )
            .await
            .unwrap()
    }

    fn advance_days(&self, days: i64) {
        self.clock.advance_secs(days * DAY);
    }
}

/// threshold=10, cap=5; three FOR voters carry quorum and majority
#[tokio::test]
async fn test_full_grant_lifecycle_pays_recipient_once() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let v1 = h.member(0x02, 100).await;
    let v2 = h.member(0x03, 100).await;
    let recipient = Principal::from_tag(0x77);
    let grant = FundAmount::from_fund(0.5);

    let id = h.propose(proposer, recipient, grant).await;
    assert_eq!(id, 1);

    let p = engine.get_proposal(id).await.unwrap();
    assert_eq!(p.status, ProposalStatus::Pending);
    assert_eq!(p.vote_start, p.created_at + chrono::Duration::days(1));
    assert_eq!(p.vote_end, p.vote_start + chrono::Duration::days(5));
    assert_eq!(p.execution_time, p.vote_end + chrono::Duration::days(2));

    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();

    for voter in [v1, v2, h.deployer] {
        engine.cast_vote(voter, id, VoteChoice::For).await.unwrap();
    }
    let mut voters: Vec<_> = engine
        .get_votes(id)
        .await
        .unwrap()
        .into_iter()
        .map(|v| (v.voter, v.weight))
        .collect();
    voters.sort();
    let mut expected = vec![(v1, 100), (v2, 100), (h.deployer, 1_000_000)];
    expected.sort();
    assert_eq!(voters, expected);

    h.advance_days(5);
    h.clock.advance_secs(1);
    assert_eq!(
        engine.finalize_proposal(id).await.unwrap(),
        ProposalStatus::Passed
    );

    h.advance_days(2);
    engine.execute_proposal(id).await.unwrap();

    assert_eq!(h.bank.received_by(&recipient).await, grant);
    assert_eq!(
        engine.get_proposal(id).await.unwrap().status,
        ProposalStatus::Executed
    );
    let stats = engine.get_treasury_stats().await;
    assert_eq!(stats.balance, FundAmount::from_fund(9.5));
    assert_eq!(stats.total_disbursed, grant);

    let err = engine.execute_proposal(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(h.bank.transfers().await.len(), 1);
}

/// 100 of 1,000,200 total weight cannot reach a 10% quorum
#[tokio::test]
async fn test_proposal_below_quorum_is_rejected() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let v1 = h.member(0x02, 100).await;
    let _v2 = h.member(0x03, 100).await;

    let id = h
        .propose(v1, Principal::from_tag(0x77), FundAmount::from_fund(0.5))
        .await;
    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();
    engine.cast_vote(v1, id, VoteChoice::For).await.unwrap();

    let stats = engine.get_vote_stats(id).await.unwrap();
    assert_eq!(stats.quorum_needed, 100_020);
    assert_eq!(stats.total_votes, 100);
    assert!(!stats.quorum_reached);

    h.advance_days(6);
    assert_eq!(
        engine.finalize_proposal(id).await.unwrap(),
        ProposalStatus::Rejected
    );
}

#[tokio::test]
async fn test_flag_blocks_activation_forever() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    engine
        .flag_proposal(&h.curator, id, "duplicate of an earlier grant")
        .await
        .unwrap();

    h.advance_days(1);
    assert_eq!(
        engine.activate_voting(id).await,
        Err(GovernanceError::ProposalFlagged(id))
    );
    h.advance_days(30);
    assert_eq!(
        engine.activate_voting(id).await,
        Err(GovernanceError::ProposalFlagged(id))
    );
    assert_eq!(
        engine.get_proposal(id).await.unwrap().status,
        ProposalStatus::Pending
    );
}

#[tokio::test]
async fn test_execute_before_timelock_fails() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();
    engine
        .cast_vote(h.deployer, id, VoteChoice::For)
        .await
        .unwrap();
    h.advance_days(6);
    engine.finalize_proposal(id).await.unwrap();

    let err = engine.execute_proposal(id).await.unwrap_err();
    assert!(matches!(err, GovernanceError::TimelockNotExpired { .. }));
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(
        engine.get_proposal(id).await.unwrap().status,
        ProposalStatus::Passed
    );

    h.advance_days(2);
    engine.execute_proposal(id).await.unwrap();
}

#[tokio::test]
async fn test_create_validation_allocates_nothing() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let small = h.member(0x01, 9).await;
    let proposer = h.member(0x02, 10).await;
    let recipient = Principal::from_tag(0x77);
    let meta = || ProposalMetadata::new("Grant", "");

    let err = engine
        .create_proposal(small, recipient, FundAmount::from_units(1), meta())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = engine
        .create_proposal(proposer, Principal::ZERO, FundAmount::from_units(1), meta())
        .await
        .unwrap_err();
    assert_eq!(err, GovernanceError::NullRecipient);

    let err = engine
        .create_proposal(proposer, recipient, FundAmount::ZERO, meta())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine
        .create_proposal(proposer, recipient, FundAmount::from_fund(5.1), meta())
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::AmountExceedsCap { .. }));

    let err = engine
        .create_proposal(
            proposer,
            recipient,
            FundAmount::from_units(1),
            ProposalMetadata::new("x".repeat(101), ""),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Cap raised above the treasury balance
    h.system
        .config
        .set_max_grant_amount(&h.admin, FundAmount::from_units(50))
        .await
        .unwrap();
    let err = engine
        .create_proposal(proposer, recipient, FundAmount::from_units(11), meta())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    assert_eq!(engine.proposal_count().await, 0);
    assert!(engine.get_proposer_history(&proposer).await.is_empty());

    let id = engine
        .create_proposal(proposer, recipient, FundAmount::from_units(5), meta())
        .await
        .unwrap();
    assert_eq!(id, 1);
}

#[tokio::test]
async fn test_ids_are_monotonic() {
    let h = Harness::new().await;
    let proposer = h.member(0x01, 10).await;
    for expected in 1..=4 {
        let id = h
            .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
            .await;
        assert_eq!(id, expected);
    }
    assert_eq!(
        h.system.engine.get_proposer_history(&proposer).await,
        vec![1, 2, 3, 4]
    );
}

#[tokio::test]
async fn test_activation_waits_for_delay() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;

    h.clock.advance_secs(DAY - 1);
    let err = engine.activate_voting(id).await.unwrap_err();
    assert!(matches!(err, GovernanceError::VotingNotStarted { .. }));

    h.clock.advance_secs(1);
    engine.activate_voting(id).await.unwrap();
    assert!(engine.activate_voting(id).await.is_err());
}

#[tokio::test]
async fn test_vote_window_and_single_vote() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let voter = h.member(0x02, 100).await;
    let late = h.member(0x03, 100).await;
    let nobody = Principal::from_tag(0x04);

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;

    // Not active yet
    let err = engine.cast_vote(voter, id, VoteChoice::For).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();

    assert_eq!(
        engine.cast_vote(voter, id, VoteChoice::Against).await,
        Ok(100)
    );
    let err = engine.cast_vote(voter, id, VoteChoice::For).await.unwrap_err();
    assert!(matches!(err, GovernanceError::DuplicateVote { .. }));

    let err = engine.cast_vote(nobody, id, VoteChoice::For).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let p = engine.get_proposal(id).await.unwrap();
    assert_eq!((p.for_votes, p.against_votes, p.abstain_votes), (0, 100, 0));
    assert_eq!(
        engine.get_vote_record(id, &voter).await.unwrap().choice,
        VoteChoice::Against
    );
    assert!(!engine.has_voted(id, &nobody).await);

    // Exactly at vote_end is still inside the window
    h.clock.set(p.vote_end);
    engine.cast_vote(proposer, id, VoteChoice::Abstain).await.unwrap();

    h.clock.advance_secs(1);
    let err = engine.cast_vote(late, id, VoteChoice::For).await.unwrap_err();
    assert!(matches!(err, GovernanceError::VotingClosed { .. }));
}

#[tokio::test]
async fn test_vote_uses_live_weight() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let whale = h.member(0x02, 1).await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();

    // Weight acquired after creation counts at cast time
    h.oracle.set_weight(whale, 500_000).await;
    assert_eq!(
        engine.cast_vote(whale, id, VoteChoice::For).await,
        Ok(500_000)
    );
}

#[tokio::test]
async fn test_finalize_only_after_vote_end() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    assert!(engine.finalize_proposal(id).await.is_err());

    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();
    engine
        .cast_vote(h.deployer, id, VoteChoice::For)
        .await
        .unwrap();

    h.clock
        .set(engine.get_proposal(id).await.unwrap().vote_end);
    let err = engine.finalize_proposal(id).await.unwrap_err();
    assert!(matches!(err, GovernanceError::VotingNotEnded { .. }));

    h.clock.advance_secs(1);
    assert_eq!(
        engine.finalize_proposal(id).await.unwrap(),
        ProposalStatus::Passed
    );
    assert!(engine.finalize_proposal(id).await.is_err());
}

#[tokio::test]
async fn test_tie_is_rejected() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let yes = h.member(0x02, 400_000).await;
    let no = h.member(0x03, 400_000).await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();
    engine.cast_vote(yes, id, VoteChoice::For).await.unwrap();
    engine.cast_vote(no, id, VoteChoice::Against).await.unwrap();

    let stats = engine.get_vote_stats(id).await.unwrap();
    assert!(stats.quorum_reached);

    h.advance_days(6);
    assert_eq!(
        engine.finalize_proposal(id).await.unwrap(),
        ProposalStatus::Rejected
    );
}

#[tokio::test]
async fn test_cancel_authorization() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let stranger = h.member(0x05, 1_000).await;

    let first = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    let second = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;

    let err = engine.cancel_proposal(&stranger, first).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    engine.cancel_proposal(&proposer, first).await.unwrap();

    h.advance_days(1);
    engine.activate_voting(second).await.unwrap();
    engine.cancel_proposal(&h.curator, second).await.unwrap();

    assert_eq!(
        engine
            .get_proposals_by_status(ProposalStatus::Cancelled)
            .await
            .len(),
        2
    );
    let last = h.system.events.last().await.unwrap();
    assert_eq!(
        last.event,
        GovernanceEvent::ProposalCancelled {
            id: second,
            cancelled_by: h.curator
        }
    );
}

#[tokio::test]
async fn test_flag_requires_curator_and_pending() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    let err = engine.flag_proposal(&proposer, id, "spam").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();
    let err = engine
        .flag_proposal(&h.curator, id, "too late")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(!engine.get_proposal(id).await.unwrap().flagged);
}

#[tokio::test]
async fn test_pause_blocks_create_vote_execute_only() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let recipient = Principal::from_tag(0x77);

    let passed = h.propose(proposer, recipient, FundAmount::from_units(1)).await;
    let other = h.propose(proposer, recipient, FundAmount::from_units(1)).await;
    let flagged = h.propose(proposer, recipient, FundAmount::from_units(1)).await;
    h.advance_days(1);
    engine.activate_voting(passed).await.unwrap();
    engine
        .cast_vote(h.deployer, passed, VoteChoice::For)
        .await
        .unwrap();

    h.system.access.pause(&h.admin).await.unwrap();

    assert_eq!(
        engine
            .create_proposal(
                proposer,
                recipient,
                FundAmount::from_units(1),
                ProposalMetadata::new("Paused", "")
            )
            .await,
        Err(GovernanceError::Paused)
    );
    assert_eq!(
        engine.cast_vote(proposer, passed, VoteChoice::For).await,
        Err(GovernanceError::Paused)
    );

    // Not blocked: activation, flagging, cancellation, finalization, views
    engine.activate_voting(other).await.unwrap();
    engine
        .flag_proposal(&h.curator, flagged, "paused review")
        .await
        .unwrap();
    engine.cancel_proposal(&proposer, other).await.unwrap();
    h.advance_days(6);
    assert_eq!(
        engine.finalize_proposal(passed).await.unwrap(),
        ProposalStatus::Passed
    );
    assert!(engine.get_vote_stats(passed).await.is_ok());

    h.advance_days(2);
    assert_eq!(
        engine.execute_proposal(passed).await,
        Err(GovernanceError::Paused)
    );

    h.system.access.unpause(&h.admin).await.unwrap();
    engine.execute_proposal(passed).await.unwrap();
}

#[tokio::test]
async fn test_config_changes_apply_to_new_proposals() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;

    h.system
        .config
        .set_voting_delay(&h.admin, 3_600)
        .await
        .unwrap();
    h.system
        .config
        .set_proposal_threshold(&h.admin, 11)
        .await
        .unwrap();

    let err = engine
        .create_proposal(
            proposer,
            Principal::from_tag(0x77),
            FundAmount::from_units(1),
            ProposalMetadata::new("Grant", ""),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GovernanceError::InsufficientWeight { .. }));

    h.oracle.set_weight(proposer, 11).await;
    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    let p = engine.get_proposal(id).await.unwrap();
    assert_eq!(p.vote_start - p.created_at, chrono::Duration::hours(1));
}

#[tokio::test]
async fn test_event_trail_for_successful_calls_only() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    let proposer = h.member(0x01, 10).await;
    let before = h.system.events.len().await;

    let id = h
        .propose(proposer, Principal::from_tag(0x77), FundAmount::from_units(1))
        .await;
    assert!(engine.activate_voting(id).await.is_err());
    h.advance_days(1);
    engine.activate_voting(id).await.unwrap();
    engine
        .cast_vote(h.deployer, id, VoteChoice::For)
        .await
        .unwrap();
    assert!(engine.cast_vote(h.deployer, id, VoteChoice::For).await.is_err());
    h.advance_days(6);
    engine.finalize_proposal(id).await.unwrap();
    h.advance_days(2);
    engine.execute_proposal(id).await.unwrap();

    let types: Vec<&str> = h
        .system
        .events
        .since(before as u64)
        .await
        .iter()
        .map(|r| r.event.event_type())
        .collect();
    assert_eq!(
        types,
        vec![
            "proposal.created",
            "proposal.activated",
            "vote.cast",
            "proposal.finalized",
            "treasury.disbursed",
            "proposal.executed",
        ]
    );
}

#[tokio::test]
async fn test_unknown_proposal() {
    let h = Harness::new().await;
    let engine = &h.system.engine;
    assert_eq!(
        engine.activate_voting(42).await,
        Err(GovernanceError::ProposalNotFound(42))
    );
    assert!(engine.get_vote_stats(42).await.is_err());
    assert!(engine.get_proposal(42).await.is_err());
    assert_eq!(
        engine.get_votes(42).await,
        Err(GovernanceError::ProposalNotFound(42))
    );
}
