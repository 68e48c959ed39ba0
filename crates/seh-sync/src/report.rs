//! Run results for reporting.

use std::time::Duration;

use serde::Serialize;

use seh_types::{DataType, SiteId, SyncStatus};

/// Outcome of one strategy for one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    Success,
    /// Records were written but part of the data could not be fetched.
    Partial,
    Error,
    /// Left out by the skip list, or failed under the `skip` error mode.
    Skipped,
    /// Not run because an earlier strategy failed in strict mode.
    Aborted,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Success => "success",
            StrategyStatus::Partial => "partial",
            StrategyStatus::Error => "error",
            StrategyStatus::Skipped => "skipped",
            StrategyStatus::Aborted => "aborted",
        }
    }
}

impl From<SyncStatus> for StrategyStatus {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Success => StrategyStatus::Success,
            SyncStatus::Partial => StrategyStatus::Partial,
            SyncStatus::Error => StrategyStatus::Error,
        }
    }
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub site_id: SiteId,
    pub data_type: DataType,
    pub status: StrategyStatus,
    pub records: u64,
    pub error: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl StrategyReport {
    pub fn new(site_id: SiteId, data_type: DataType, status: StrategyStatus) -> Self {
        Self {
            site_id,
            data_type,
            status,
            records: 0,
            error: None,
            duration: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteReport {
    pub site_id: SiteId,
    pub strategies: Vec<StrategyReport>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl SiteReport {
    pub fn records(&self) -> u64 {
        self.strategies.iter().map(|s| s.records).sum()
    }

    /// True when no strategy ended in error or was aborted.
    pub fn succeeded(&self) -> bool {
        !self
            .strategies
            .iter()
            .any(|s| matches!(s.status, StrategyStatus::Error | StrategyStatus::Aborted))
    }

    pub fn strategy(&self, data_type: DataType) -> Option<&StrategyReport> {
        self.strategies.iter().find(|s| s.data_type == data_type)
    }
}

/// Result of one `run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub sites: Vec<SiteReport>,
    /// Set when a site was aborted in strict mode.
    pub aborted: bool,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl RunSummary {
    pub fn total_records(&self) -> u64 {
        self.sites.iter().map(SiteReport::records).sum()
    }

    pub fn successful_sites(&self) -> usize {
        self.sites.iter().filter(|s| s.succeeded()).count()
    }

    pub fn failed_sites(&self) -> usize {
        self.sites.len() - self.successful_sites()
    }

    pub fn site(&self, site_id: SiteId) -> Option<&SiteReport> {
        self.sites.iter().find(|s| s.site_id == site_id)
    }

    /// The run failed: a strategy errored under strict mode.
    pub fn failed(&self) -> bool {
        self.aborted
    }

    /// Process exit code for the run.
    pub fn exit_code(&self) -> i32 {
        if self.failed() { 1 } else { 0 }
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
