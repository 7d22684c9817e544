//! Modelmart - browse, publish and purchase model listings.
//!
//! This is the main entry point, which:
//! - Loads configuration from TOML
//! - Validates the configured interface descriptors
//! - Runs one marketplace command against the configured node

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use modelmart::cli::{self, Command};
use modelmart::config::ModelmartConfig;

/// Modelmart - model marketplace client
#[derive(Parser, Debug)]
#[command(name = "modelmart")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override the RPC endpoint from config
    #[arg(long, value_name = "URL", env = "MODELMART_RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// Run in verbose mode (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Load configuration from the given path or default locations.
fn load_config(path: Option<PathBuf>) -> Result<ModelmartConfig> {
    let config_path = path.unwrap_or_else(|| {
        let local = PathBuf::from("modelmart.toml");
        if local.exists() {
            return local;
        }

        if let Some(dirs) = directories::ProjectDirs::from("io", "modelmart", "modelmart") {
            let xdg_config = dirs.config_dir().join("modelmart.toml");
            if xdg_config.exists() {
                return xdg_config;
            }
        }

        local
    });

    info!("Loading configuration from {}", config_path.display());
    ModelmartConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        "debug,modelmart=debug,modelmart_client=debug"
    } else {
        "warn,modelmart=info,modelmart_client=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let mut config = load_config(args.config).context("Failed to load configuration")?;
    config
        .override_rpc_url(args.rpc_url)
        .context("Invalid RPC URL override")?;
    info!(rpc_url = %config.network.rpc_url, "Using node");

    cli::execute(args.command, &config).await
}
