use crate::config::NodeConfig;
use crate::replay::{run_replay, ReplayReport, ReplayScript};
use anyhow::Result;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Write the default configuration as TOML to stdout
pub fn print_default_config() -> Result<()> {
    print!("{}", NodeConfig::default().to_toml()?);
    Ok(())
}

/// Load and validate a configuration file, printing the resolved parameters
pub fn check_config(path: &Path) -> Result<()> {
    let config = NodeConfig::from_file(path)?;
    config.validate()?;

    let params = config.governance_params()?;
    let roles = config.resolve_roles()?;
    info!(
        voting_delay_secs = params.voting_delay_secs,
        voting_period_secs = params.voting_period_secs,
        timelock_delay_secs = params.timelock_delay_secs,
        quorum_percentage = params.quorum_percentage,
        max_grant_amount = %params.max_grant_amount,
        proposal_threshold = params.proposal_threshold,
        "✅ Governance parameters valid"
    );
    info!(
        super_admin = %roles.super_admin.short(),
        admins = roles.admins.len(),
        curators = roles.curators.len(),
        "✅ Roles valid"
    );
    println!("{}: ok", path.display());
    Ok(())
}

/// Run a replay script and print one JSON line per step, then a summary line
pub async fn replay(config: &NodeConfig, script_path: &Path) -> Result<()> {
    let script = ReplayScript::from_file(script_path)?;
    info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        "▶️ Starting replay"
    );

    let report = run_replay(config, &script).await?;

    write_report(&report, std::io::stdout().lock())?;

    if report.rejected() > 0 {
        warn!(rejected = report.rejected(), "Some steps were rejected");
    }
    Ok(())
}

/// One JSON line per step, then the final treasury and proposal state
pub fn write_report(report: &ReplayReport, mut out: impl Write) -> Result<()> {
    for outcome in &report.outcomes {
        serde_json::to_writer(&mut out, outcome)?;
        writeln!(out)?;
    }
    serde_json::to_writer(&mut out, &report.summary())?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
