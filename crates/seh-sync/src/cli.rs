//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use seh_sync::ErrorMode;
use seh_types::{DataType, SiteId};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "seh")]
#[command(version, about = "Harvest SolarEdge monitoring data into SQLite", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Site filter shared by several commands
#[derive(Debug, Clone, Args)]
pub struct SiteArgs {
    /// Site id(s) - can be specified multiple times, or comma-separated
    #[arg(short, long = "site", value_delimiter = ',')]
    pub sites: Vec<SiteId>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync sites into the local database
    Sync {
        #[command(flatten)]
        sites: SiteArgs,

        /// Ignore cursors and fetch each data type's full lookback window
        #[arg(long)]
        full: bool,

        /// Error handling mode (overrides config)
        #[arg(long, value_parser = parse_error_mode)]
        error_handling: Option<ErrorMode>,

        /// Data types to leave out (overrides config), comma-separated
        #[arg(long, value_delimiter = ',', value_parser = parse_data_type)]
        skip: Vec<DataType>,

        /// Output format for the run summary
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the stored sync cursors
    Status {
        #[command(flatten)]
        sites: SiteArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the sites visible to the API key
    Sites {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn parse_error_mode(value: &str) -> Result<ErrorMode, String> {
    value.parse()
}

fn parse_data_type(value: &str) -> Result<DataType, String> {
    value.parse().map_err(|e: seh_types::ParseError| e.to_string())
}
