//! Sync command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};

use seh_store::Store;
use seh_sync::{Config, Orchestrator, RunSummary, SiteSelection};
use seh_types::SiteId;

use super::build_client;
use crate::cli::OutputFormat;

/// Run one sync and return its summary.
pub async fn cmd_sync(
    config: Config,
    sites: Vec<SiteId>,
    full: bool,
    format: OutputFormat,
) -> Result<RunSummary> {
    let client = build_client(&config.api)?;
    let store = Store::open(&config.storage.path)
        .with_context(|| format!("Failed to open database at {:?}", config.storage.path))?;

    let selection = if sites.is_empty() {
        SiteSelection::All
    } else {
        SiteSelection::Ids(sites)
    };

    let orchestrator = Orchestrator::new(Arc::new(client), store, Arc::new(config));
    let summary = orchestrator
        .run(selection, full)
        .await
        .context("Failed to list sites")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print!("{}", format_summary(&summary)),
    }
    Ok(summary)
}

fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    for site in &summary.sites {
        out.push_str(&format!(
            "Site {} ({} records, {:.1}s)\n",
            site.site_id,
            site.records(),
            site.duration.as_secs_f64()
        ));
        for strategy in &site.strategies {
            out.push_str(&format!(
                "  {:<20} {:<8} {:>7}",
                strategy.data_type.as_str(),
                strategy.status.as_str(),
                strategy.records
            ));
            if let Some(error) = &strategy.error {
                out.push_str(&format!("  {}", error));
            }
            out.push('\n');
        }
    }

    out.push_str(&format!(
        "\n{} site(s): {} ok, {} failed, {} records in {:.1}s\n",
        summary.sites.len(),
        summary.successful_sites(),
        summary.failed_sites(),
        summary.total_records(),
        summary.duration.as_secs_f64()
    ));
    if summary.failed() {
        out.push_str("Run aborted: a strategy failed in strict mode\n");
    }
    out
}
