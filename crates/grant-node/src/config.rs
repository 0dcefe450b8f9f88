use anyhow::{Context, Result};
use grant_governance::GovernanceParams;
use grant_types::{FundAmount, Principal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Complete `grantd` configuration loaded from a .toml file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub treasury: TreasuryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Governance parameters; durations in seconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub voting_delay_secs: u64,
    pub voting_period_secs: u64,
    pub timelock_delay_secs: u64,
    pub quorum_percentage: u8,
    pub max_grant_amount: FundAmount,
    pub proposal_threshold: u64,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        let params = GovernanceParams::default();
        Self {
            voting_delay_secs: params.voting_delay_secs,
            voting_period_secs: params.voting_period_secs,
            timelock_delay_secs: params.timelock_delay_secs,
            quorum_percentage: params.quorum_percentage,
            max_grant_amount: params.max_grant_amount,
            proposal_threshold: params.proposal_threshold as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RolesConfig {
    /// Hex principal holding SuperAdmin at startup
    pub super_admin: String,
    pub admins: Vec<String>,
    pub curators: Vec<String>,
    /// Identity of the lifecycle engine; defaults to the built-in engine principal
    pub engine: Option<String>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            super_admin: Principal::from_tag(0x01).to_hex(),
            admins: Vec::new(),
            curators: Vec::new(),
            engine: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TreasuryConfig {
    /// Deposited by the super admin at startup when non-zero
    pub initial_deposit: FundAmount,
    pub note: String,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            initial_deposit: FundAmount::ZERO,
            note: "initial funding".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// pretty | compact | json
    pub format: String,
    pub file_output: Option<String>,
    pub module_filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
        }
    }
}

/// Principals granted at startup
#[derive(Debug, Clone)]
pub struct ResolvedRoles {
    pub super_admin: Principal,
    pub admins: Vec<Principal>,
    pub curators: Vec<Principal>,
    pub engine: Option<Principal>,
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Runtime overrides for logging only; governance parameters come from the file
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            info!(old = %self.logging.level, new = %level, "Overriding log level from environment");
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            info!(
                old = %self.logging.format,
                new = %format,
                "Overriding log format from environment"
            );
            self.logging.format = format;
        }
    }

    pub fn governance_params(&self) -> Result<GovernanceParams> {
        let g = &self.governance;
        let params = GovernanceParams {
            voting_delay_secs: g.voting_delay_secs,
            voting_period_secs: g.voting_period_secs,
            timelock_delay_secs: g.timelock_delay_secs,
            quorum_percentage: g.quorum_percentage,
            max_grant_amount: g.max_grant_amount,
            proposal_threshold: g.proposal_threshold as u128,
        };
        params
            .validate()
            .context("Invalid [governance] section")?;
        Ok(params)
    }

    pub fn resolve_roles(&self) -> Result<ResolvedRoles> {
        let parse = |label: &str, hex: &str| -> Result<Principal> {
            let p = Principal::from_hex(hex)
                .with_context(|| format!("Invalid {} principal: {}", label, hex))?;
            if p.is_zero() {
                anyhow::bail!("{} principal must not be zero", label);
            }
            Ok(p)
        };

        Ok(ResolvedRoles {
            super_admin: parse("super_admin", &self.roles.super_admin)?,
            admins: self
                .roles
                .admins
                .iter()
                .map(|h| parse("admin", h))
                .collect::<Result<_>>()?,
            curators: self
                .roles
                .curators
                .iter()
                .map(|h| parse("curator", h))
                .collect::<Result<_>>()?,
            engine: self
                .roles
                .engine
                .as_deref()
                .map(|h| parse("engine", h))
                .transpose()?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.governance_params()?;
        self.resolve_roles()?;
        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => anyhow::bail!("Unknown logging format '{}'", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.governance_params().unwrap(), GovernanceParams::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
            [governance]
            quorum_percentage = 20
            max_grant_amount = "2.5"
            "#,
        )
        .unwrap();

        let params = config.governance_params().unwrap();
        assert_eq!(params.quorum_percentage, 20);
        assert_eq!(params.max_grant_amount, FundAmount::from_fund(2.5));
        assert_eq!(params.voting_delay_secs, 86_400);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_out_of_range_rejected() {
        let config: NodeConfig = toml::from_str(
            r#"
            [governance]
            voting_period_secs = 60
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_principal_rejected() {
        let mut config = NodeConfig::default();
        config.roles.curators.push("not-hex".to_string());
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.roles.super_admin = Principal::ZERO.to_hex();
        assert!(config.resolve_roles().is_err());
    }

    #[test]
    fn test_toml_serialization_parses_back() {
        let mut config = NodeConfig::default();
        config.treasury.initial_deposit = FundAmount::from_units(100);
        config.roles.admins.push(Principal::from_tag(2).to_hex());

        let text = config.to_toml().unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.treasury.initial_deposit, FundAmount::from_units(100));
        assert_eq!(parsed.roles.admins, config.roles.admins);
    }
}
