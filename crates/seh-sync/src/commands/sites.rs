//! Sites command implementation.

use anyhow::{Context, Result};
use serde::Serialize;

use seh_core::responses::SiteDetails;
use seh_sync::Config;

use super::{build_client, or_dash};
use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
struct SiteRow {
    id: Option<u64>,
    name: Option<String>,
    status: Option<String>,
    peak_power: Option<f64>,
    country: Option<String>,
}

impl From<SiteDetails> for SiteRow {
    fn from(site: SiteDetails) -> Self {
        Self {
            id: site.id,
            name: site.name,
            status: site.status,
            peak_power: site.peak_power,
            country: site.location.country,
        }
    }
}

pub async fn cmd_sites(config: &Config, format: OutputFormat) -> Result<()> {
    let client = build_client(&config.api)?;
    let sites: Vec<SiteRow> = client
        .get_sites()
        .await
        .context("Failed to list sites")?
        .into_iter()
        .map(SiteRow::from)
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sites)?),
        OutputFormat::Text => {
            print!("{}", format_sites(&sites));
            println!(
                "\nAPI quota: {} of {} requests left today",
                client.remaining_requests(),
                client.rate_limiter().daily_limit()
            );
        }
    }
    Ok(())
}

fn format_sites(sites: &[SiteRow]) -> String {
    if sites.is_empty() {
        return "No sites visible to this API key\n".to_string();
    }
    let mut out = format!(
        "{:<10} {:<30} {:<10} {:>8}  {}\n",
        "ID", "NAME", "STATUS", "PEAK kW", "COUNTRY"
    );
    for site in sites {
        out.push_str(&format!(
            "{:<10} {:<30} {:<10} {:>8}  {}\n",
            or_dash(site.id),
            or_dash(site.name.as_deref()),
            or_dash(site.status.as_deref()),
            or_dash(site.peak_power),
            or_dash(site.country.as_deref()),
        ));
    }
    out
}
