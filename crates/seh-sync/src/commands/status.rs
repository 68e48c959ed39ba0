//! Status command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use seh_store::{Store, SyncCursor};
use seh_types::SiteId;

use super::or_dash;
use crate::cli::OutputFormat;

pub fn cmd_status(db_path: &Path, sites: &[SiteId], format: OutputFormat) -> Result<()> {
    let store = Store::open(db_path)
        .with_context(|| format!("Failed to open database at {:?}", db_path))?;

    let mut cursors = store.list_cursors(None)?;
    if !sites.is_empty() {
        cursors.retain(|c| sites.contains(&c.site_id));
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cursors)?),
        OutputFormat::Text => print!("{}", format_cursors(&cursors)),
    }
    Ok(())
}

fn format_cursors(cursors: &[SyncCursor]) -> String {
    if cursors.is_empty() {
        return "No sync history\n".to_string();
    }

    let mut out = format!(
        "{:<10} {:<20} {:<8} {:>8}  {:<25} {:<25} {}\n",
        "SITE", "DATA TYPE", "STATUS", "RECORDS", "LAST SYNC", "LAST DATA", "ERROR"
    );
    for cursor in cursors {
        out.push_str(&format!(
            "{:<10} {:<20} {:<8} {:>8}  {:<25} {:<25} {}\n",
            cursor.site_id,
            cursor.data_type.as_str(),
            cursor.status.as_str(),
            cursor.records_synced,
            format_time(Some(cursor.last_sync_time)),
            format_time(cursor.last_data_timestamp),
            or_dash(cursor.error_message.as_deref()),
        ));
    }
    out
}

fn format_time(ts: Option<OffsetDateTime>) -> String {
    or_dash(ts.and_then(|t| t.format(&Rfc3339).ok()))
}
