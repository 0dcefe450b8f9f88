use anyhow::Result;
use clap::{Parser, Subcommand};
use grant_node::{cli, config, logging};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grantd")]
#[command(about = "Token-weighted grant governance engine", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default configuration as TOML
    PrintDefaultConfig,

    /// Validate a configuration file
    CheckConfig {
        /// Configuration file to validate
        path: PathBuf,
    },

    /// Run a JSON script of governance operations against an in-memory system
    Replay {
        /// Script file
        script: PathBuf,
    },
}

const DEFAULT_CONFIG_PATH: &str = "./grantd.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::PrintDefaultConfig = cli.command {
        return cli::print_default_config();
    }

    let config_path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        default.exists().then_some(default)
    });
    let mut node_config = match &config_path {
        Some(path) => config::NodeConfig::from_file(path)?,
        None => config::NodeConfig::default(),
    };
    node_config.apply_env_overrides();

    if let Err(e) = logging::init_logging(&node_config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        // Fall back to basic logging
        let log_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| format!("grantd={}", log_level)),
            ))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match &config_path {
        Some(path) => info!(path = %path.display(), "⚙️ Configuration loaded"),
        None => info!("⚙️ No configuration file, using defaults"),
    }

    match cli.command {
        Commands::PrintDefaultConfig => Ok(()),
        Commands::CheckConfig { path } => cli::check_config(&path),
        Commands::Replay { script } => {
            node_config.validate()?;
            cli::replay(&node_config, &script).await
        }
    }
}
