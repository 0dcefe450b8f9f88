pub mod cli;
pub mod config;
pub mod logging;
pub mod replay;

pub use config::NodeConfig;
pub use replay::{run_replay, ReplayReport, ReplayScript, ReplaySummary, Step, StepOutcome};
