/*!
# Grant Governance

Token-weighted grant governance: members propose transfers from a shared
fund, vote with stake-weighted power, and a passed proposal unlocks a
delayed disbursement.

## Lifecycle

```text
PENDING ──activate──▶ ACTIVE ──finalize──▶ PASSED ──execute──▶ EXECUTED
   │                    │          └──────▶ REJECTED
   └──────cancel────────┴──────────────────▶ CANCELLED
```

- `vote_start = created_at + voting_delay`
- `vote_end = vote_start + voting_period`
- `execution_time = vote_end + timelock_delay`
- Passes iff `total_votes ≥ floor(supply × quorum% / 100)` and `for > against`

## Fund safety

- Only the registered executor can trigger a disbursement, and at most
  one outflow is in flight at a time.
- A proposal is marked executed and the ledger debited before the
  external transfer; a failed transfer restores both.
- Emergency withdrawal is a separate SuperAdmin operation with its own
  audit event.

## Module Structure

- **access**: roles and the pause flag
- **parameters**: admin-gated, range-checked config
- **treasury**: fund ledger and disbursement
- **registry**: proposals, votes, proposer history
- **voting**: quorum and majority rules
- **lifecycle**: the state machine tying everything together
- **events**: audit log
- **system**: wiring helper

## Example Usage

```rust,no_run
use grant_governance::{
    ManualClock, MemoryBank, MemoryWeightOracle, ProposalMetadata, SystemBuilder,
};
use grant_types::{FundAmount, Principal};
use std::sync::Arc;

# async fn demo() -> grant_governance::Result<()> {
let admin = Principal::from_tag(1);
let oracle = Arc::new(MemoryWeightOracle::new());
oracle.set_weight(admin, 1_000).await;

let system = SystemBuilder::new(
    admin,
    oracle,
    Arc::new(MemoryBank::new()),
    Arc::new(ManualClock::default()),
)
.build()
.await?;

system.treasury.deposit(admin, FundAmount::from_units(10), "seed").await?;
let id = system
    .engine
    .create_proposal(
        admin,
        Principal::from_tag(2),
        FundAmount::from_fund(0.5),
        ProposalMetadata::new("Docs bounty", "Write the user guide"),
    )
    .await?;
assert_eq!(id, 1);
# Ok(())
# }
```
*/

pub mod access;
pub mod clock;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod oracle;
pub mod parameters;
pub mod registry;
pub mod system;
pub mod treasury;
pub mod types;
pub mod voting;

pub use access::AccessControlRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, GovernanceError, Result};
pub use events::{EventLog, EventRecord, GovernanceEvent};
pub use lifecycle::ProposalLifecycleManager;
pub use memory::{MemoryBank, MemoryWeightOracle};
pub use oracle::{FundsTransfer, WeightOracle};
pub use parameters::{ConfigStore, GovernanceParams, ParamKey, ParameterChange};
pub use registry::ProposalRegistry;
pub use system::{default_engine_principal, GovernanceSystem, SystemBuilder};
pub use treasury::TreasuryLedger;
pub use types::{
    DepositRecord, LifecycleState, OutflowKind, OutflowRecord, Proposal, ProposalMetadata,
    ProposalStatus, Role, TreasuryStats, VoteChoice, VoteRecord, VoteStats,
};
