//! Incremental, idempotent sync of SolarEdge monitoring data into SQLite.
//!
//! This crate ties the API client (seh-core) and the store (seh-store)
//! together:
//! - Computes a fetch window per `(site, data_type)` from the stored cursor,
//!   with an overlap buffer on every incremental run
//! - Runs one strategy per data type, in a fixed order per site
//! - Upserts the mapped records, then advances the cursor
//! - Applies the configured error mode (`strict`, `lenient`, `skip`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use seh_core::SolarEdgeClient;
//! use seh_store::Store;
//! use seh_sync::{Config, Orchestrator, SiteSelection};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut config = Config::load_default()?;
//! config.apply_env()?;
//! config.validate()?;
//!
//! let client = SolarEdgeClient::http(&config.api.base_url, &config.api.api_key, config.api.timeout())?
//!     .with_rate_limiter(Arc::new(config.api.rate_limiter()))
//!     .with_retry_config(config.api.retry_config());
//! let store = Store::open(&config.storage.path)?;
//!
//! let orchestrator = Orchestrator::new(Arc::new(client), store, Arc::new(config));
//! let summary = orchestrator.run(SiteSelection::All, false).await?;
//! println!("{} records", summary.total_records());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod persistence;
pub mod report;
pub mod strategy;
pub mod window;

pub use config::{
    ApiConfig, Config, ConfigError, ErrorMode, StorageConfig, SyncConfig, ValidationError,
    default_config_path,
};
pub use error::SyncError;
pub use orchestrator::{Orchestrator, PREREQUISITE_FAILED, SiteSelection};
pub use persistence::Persistence;
pub use report::{RunSummary, SiteReport, StrategyReport, StrategyStatus};
pub use strategy::{Payload, Strategy, StrategyInput, StrategyOutput};
pub use window::{FetchWindow, advance_high_water, compute_window};
