//! seh - SolarEdge harvest sync.
//!
//! Run with: `cargo run -p seh-sync -- sync`

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use seh_sync::Config;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "seh=debug" } else { "seh=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    config.apply_env().context("Invalid environment override")?;
    if let Some(path) = cli.database {
        config.storage.path = path;
    }

    match cli.command {
        Command::Sync {
            sites,
            full,
            error_handling,
            skip,
            format,
        } => {
            if let Some(mode) = error_handling {
                config.sync.error_handling = mode;
            }
            if !skip.is_empty() {
                config.sync.skip_data_types = skip;
            }
            config.validate()?;
            debug!("Configuration: {:?}", config);

            let summary = commands::cmd_sync(config, sites.sites, full, format).await?;
            std::process::exit(summary.exit_code());
        }
        Command::Status { sites, format } => {
            commands::cmd_status(&config.storage.path, &sites.sites, format)
        }
        Command::Sites { format } => {
            config.validate()?;
            commands::cmd_sites(&config, format).await
        }
    }
}
