//! Drives the strategies across sites.
//!
//! For every selected site the orchestrator runs [`Strategy::REGISTRY`] in
//! order, one strategy at a time. Sites run concurrently, bounded by the
//! API concurrency cap; the rate limiter inside the client is what actually
//! gates outbound calls.
//!
//! Per strategy:
//!
//! 1. read the cursor and compute the fetch window
//! 2. fetch and map (no store access)
//! 3. upsert the records, then advance the cursor
//!
//! Records are committed before the cursor moves. An interrupted run leaves
//! the cursor where it was and the next run re-fetches the same window.

use std::sync::Arc;

use futures::StreamExt;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use seh_core::{SolarEdgeClient, Transport};
use seh_store::SyncCursor;
use seh_types::{DataType, SiteId};

use crate::config::{Config, ErrorMode};
use crate::error::SyncError;
use crate::persistence::Persistence;
use crate::report::{RunSummary, SiteReport, StrategyReport, StrategyStatus};
use crate::strategy::{Strategy, StrategyInput};
use crate::window::{advance_high_water, compute_window};

/// Note recorded on telemetry cursors when equipment failed earlier in the run.
pub const PREREQUISITE_FAILED: &str = "equipment prerequisite failed in this run";

type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Which sites a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSelection {
    /// Every site visible to the API key, narrowed by `sync.site_ids` when set.
    All,
    Ids(Vec<SiteId>),
}

pub struct Orchestrator<T: Transport, S: Persistence> {
    client: Arc<SolarEdgeClient<T>>,
    store: Arc<Mutex<S>>,
    config: Arc<Config>,
    clock: Clock,
}

/// Result of one successful strategy run.
struct Outcome {
    status: StrategyStatus,
    records: u64,
    message: Option<String>,
}

impl<T: Transport, S: Persistence> Orchestrator<T, S> {
    pub fn new(client: Arc<SolarEdgeClient<T>>, store: S, config: Arc<Config>) -> Self {
        Self {
            client,
            store: Arc::new(Mutex::new(store)),
            config,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    /// Replace the wall clock used for windows and cursor times.
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> OffsetDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    pub fn client(&self) -> &SolarEdgeClient<T> {
        &self.client
    }

    /// Sync the selected sites.
    ///
    /// With `full` set every strategy fetches its lookback window whatever
    /// its cursor says; high-water marks still never move backwards.
    ///
    /// Fails only when the site list itself cannot be fetched. Strategy
    /// failures are handled per the configured error mode and reported in
    /// the summary.
    pub async fn run(&self, selection: SiteSelection, full: bool) -> Result<RunSummary, SyncError> {
        let started = Instant::now();
        let site_ids = self.resolve_sites(selection).await?;

        info!(
            "Syncing {} site(s) (mode: {}, full: {})",
            site_ids.len(),
            self.config.sync.error_handling,
            full
        );

        let concurrency = self.config.api.max_concurrent.max(1);
        let sites: Vec<SiteReport> = futures::stream::iter(site_ids)
            .map(|site_id| self.sync_site(site_id, full))
            .buffered(concurrency)
            .collect()
            .await;

        let aborted = self.config.sync.error_handling == ErrorMode::Strict
            && sites.iter().any(|s| !s.succeeded());

        let summary = RunSummary {
            sites,
            aborted,
            duration: started.elapsed(),
        };

        info!(
            sites = summary.sites.len(),
            successful = summary.successful_sites(),
            failed = summary.failed_sites(),
            records = summary.total_records(),
            "Sync complete"
        );
        Ok(summary)
    }

    async fn resolve_sites(&self, selection: SiteSelection) -> Result<Vec<SiteId>, SyncError> {
        match selection {
            SiteSelection::Ids(ids) => Ok(ids),
            SiteSelection::All => {
                let sites = self.client.get_sites().await?;
                let wanted = &self.config.sync.site_ids;
                let ids = sites
                    .into_iter()
                    .filter_map(|site| site.id)
                    .filter(|id| wanted.is_empty() || wanted.contains(id))
                    .collect();
                Ok(ids)
            }
        }
    }

    /// Run every strategy for one site, in registry order.
    pub async fn sync_site(&self, site_id: SiteId, full: bool) -> SiteReport {
        let started = Instant::now();
        let mode = self.config.sync.error_handling;
        let mut strategies = Vec::with_capacity(Strategy::REGISTRY.len());
        let mut equipment_failed = false;
        let mut aborted = false;

        info!(site_id, "Syncing site");

        for strategy in Strategy::REGISTRY {
            let data_type = strategy.data_type();

            if aborted {
                strategies.push(StrategyReport::new(site_id, data_type, StrategyStatus::Aborted));
                continue;
            }
            if self.config.sync.is_skipped(data_type) {
                debug!(site_id, data_type = %data_type, "Skipped by configuration");
                strategies.push(StrategyReport::new(site_id, data_type, StrategyStatus::Skipped));
                continue;
            }

            let strategy_started = Instant::now();
            let prerequisite_failed = equipment_failed && strategy.equipment_kind().is_some();
            let mut report = match self.sync_strategy(site_id, strategy, full, prerequisite_failed).await {
                Ok(outcome) => {
                    info!(
                        site_id,
                        data_type = %data_type,
                        records = outcome.records,
                        status = %outcome.status,
                        "Strategy complete"
                    );
                    StrategyReport {
                        records: outcome.records,
                        error: outcome.message,
                        ..StrategyReport::new(site_id, data_type, outcome.status)
                    }
                }
                Err(e) => {
                    if data_type == DataType::Equipment {
                        equipment_failed = true;
                    }
                    let status = self.handle_failure(site_id, data_type, &e).await;
                    if mode == ErrorMode::Strict {
                        aborted = true;
                    }
                    StrategyReport {
                        error: Some(e.cursor_message()),
                        ..StrategyReport::new(site_id, data_type, status)
                    }
                }
            };
            report.duration = strategy_started.elapsed();
            strategies.push(report);
        }

        SiteReport {
            site_id,
            strategies,
            duration: started.elapsed(),
        }
    }

    async fn sync_strategy(
        &self,
        site_id: SiteId,
        strategy: Strategy,
        full: bool,
        prerequisite_failed: bool,
    ) -> Result<Outcome, SyncError> {
        let data_type = strategy.data_type();
        let sync = &self.config.sync;
        let now = (self.clock)();

        let (previous, equipment) = {
            let store = self.store.lock().await;
            let previous = store.get_cursor(site_id, data_type)?;
            let equipment = match strategy.equipment_kind() {
                Some(kind) => store.known_equipment(site_id, kind)?,
                None => Vec::new(),
            };
            (previous, equipment)
        };

        let window = compute_window(
            previous.as_ref(),
            strategy.lookback(sync),
            sync.overlap(),
            now,
            full,
        );
        debug!(
            site_id,
            data_type = %data_type,
            start = %window.start,
            end = %window.end,
            "Fetch window"
        );

        let input = StrategyInput {
            site_id,
            window,
            captured_at: now,
            equipment,
        };
        let payload = strategy.fetch(&self.client, &input).await?;
        let mut output = Strategy::map(site_id, payload);
        if prerequisite_failed {
            output.warnings.push(PREREQUISITE_FAILED.to_string());
        }

        let mut store = self.store.lock().await;
        let written = store.upsert(&output.batch)? as u64;

        let high_water = advance_high_water(
            previous.as_ref().and_then(|c| c.last_data_timestamp),
            output.batch.observed_high_water(),
        );
        let mut cursor = SyncCursor::success(site_id, data_type, (self.clock)(), high_water, written);
        let message = if output.warnings.is_empty() {
            None
        } else {
            let message = truncate(&output.warnings.join("; "));
            warn!(site_id, data_type = %data_type, "Partial sync: {}", message);
            cursor = cursor.partial(message.clone());
            Some(message)
        };
        store.set_cursor(&cursor)?;

        Ok(Outcome {
            status: cursor.status.into(),
            records: written,
            message,
        })
    }

    /// Apply the error mode to a failed strategy and return its reported status.
    async fn handle_failure(
        &self,
        site_id: SiteId,
        data_type: DataType,
        err: &SyncError,
    ) -> StrategyStatus {
        let mode = self.config.sync.error_handling;
        if mode == ErrorMode::Skip {
            debug!(site_id, data_type = %data_type, "Ignoring failure: {}", err);
            return StrategyStatus::Skipped;
        }

        error!(site_id, data_type = %data_type, mode = %mode, "Strategy failed: {}", err);

        let mut store = self.store.lock().await;
        // Without the previous cursor the high-water mark would be lost.
        let previous = match store.get_cursor(site_id, data_type) {
            Ok(previous) => previous,
            Err(e) => {
                error!(site_id, data_type = %data_type, "Leaving cursor unchanged, read failed: {}", e);
                return StrategyStatus::Error;
            }
        };
        let cursor = SyncCursor::error(
            site_id,
            data_type,
            (self.clock)(),
            previous.as_ref(),
            err.cursor_message(),
        );
        if let Err(e) = store.set_cursor(&cursor) {
            error!(site_id, data_type = %data_type, "Failed to record error cursor: {}", e);
        }
        StrategyStatus::Error
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(500).collect()
}
