//! Client for the SolarEdge monitoring API.
//!
//! Every logical request runs under the retry policy; every attempt holds a
//! [`RateLimitLease`](crate::RateLimitLease) only for the duration of its
//! HTTP exchange. The API key travels as the `api_key` query parameter.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use seh_core::SolarEdgeClient;
//!
//! # async fn example() -> seh_core::Result<()> {
//! let client = SolarEdgeClient::http(
//!     "https://monitoringapi.solaredge.com",
//!     "MY_API_KEY",
//!     Duration::from_secs(10),
//! )?;
//! for site in client.get_sites().await? {
//!     println!("{:?} {:?}", site.id, site.name);
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use time::{Date, OffsetDateTime};
use tokio::time::Instant;
use tracing::{debug, warn};

use seh_types::{SiteId, format_api_date, format_api_datetime};

use crate::error::{Error, Result};
use crate::rate_limiter::RateLimiter;
use crate::responses::{
    AlertData, AlertsEnvelope, BatteryData, DatedValue, EnergyEnvelope, EnvBenefits,
    EnvBenefitsEnvelope, EquipmentDataEnvelope, EquipmentEnvelope, Inventory, InventoryEntry,
    InventoryEnvelope, MeterSeries, MetersEnvelope, PowerEnvelope, PowerFlowEnvelope,
    PowerFlowSnapshot, Reporter, SiteDetails, SiteDetailsEnvelope, SitesEnvelope,
    StorageEnvelope, TelemetrySample,
};
use crate::retry::{RetryConfig, with_retry};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Default vendor endpoint.
pub const DEFAULT_BASE_URL: &str = "https://monitoringapi.solaredge.com";

/// Rate-limited, retrying client for the monitoring API.
pub struct SolarEdgeClient<T: Transport = HttpTransport> {
    transport: T,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl<T: Transport> std::fmt::Debug for SolarEdgeClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolarEdgeClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish()
    }
}

impl SolarEdgeClient<HttpTransport> {
    /// Create a client backed by `reqwest` with default limits.
    pub fn http(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Self::with_transport(HttpTransport::new(timeout)?, base_url, api_key)
    }
}

impl<T: Transport> SolarEdgeClient<T> {
    /// Create a client over an arbitrary transport.
    ///
    /// Uses a [`RateLimiter`] of 3 concurrent / 300 daily requests and the
    /// default [`RetryConfig`] until overridden.
    pub fn with_transport(transport: T, base_url: &str, api_key: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("API key must not be empty".to_string()));
        }

        Ok(Self {
            transport,
            base_url,
            api_key: api_key.to_string(),
            limiter: Arc::new(RateLimiter::new(3, 300)),
            retry: RetryConfig::default(),
        })
    }

    /// Share `limiter` with this client.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Requests still allowed in the rolling 24-hour window.
    pub fn remaining_requests(&self) -> u32 {
        self.limiter.remaining()
    }

    /// Requests issued in the rolling 24-hour window.
    pub fn requests_today(&self) -> u32 {
        self.limiter.requests_in_window()
    }

    /// Issue `request` under the retry policy and decode the JSON body.
    pub async fn request<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R> {
        with_retry(&self.retry, &request.path, || self.attempt(&request)).await
    }

    async fn attempt<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R> {
        let lease = self.limiter.acquire().await?;
        let authenticated = request.clone().param("api_key", self.api_key.as_str());
        let started = Instant::now();
        let outcome = self.transport.get(&self.base_url, &authenticated).await;
        lease.release();
        let latency_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!(method = "GET", path = %request.path, latency_ms, error = %e, "API request failed");
                return Err(e);
            }
        };

        if !response.is_success() {
            let err = Error::from_status(response.status, &response.body);
            warn!(
                method = "GET",
                path = %request.path,
                status = response.status,
                latency_ms,
                error = %err,
                "API request failed"
            );
            return Err(err);
        }

        debug!(
            method = "GET",
            path = %request.path,
            status = response.status,
            latency_ms,
            "API request"
        );
        serde_json::from_str(&response.body)
            .map_err(|e| Error::Validation(format!("{}: {}", request.path, e)))
    }

    // ==================== Sites ====================

    /// Sites visible to the API key.
    pub async fn get_sites(&self) -> Result<Vec<SiteDetails>> {
        let envelope: SitesEnvelope = self.request(ApiRequest::new("/sites/list")).await?;
        Ok(envelope.sites.site)
    }

    /// Site details; `None` when the vendor returns no details object or an
    /// empty one.
    pub async fn get_site_details(&self, site_id: SiteId) -> Result<Option<SiteDetails>> {
        let envelope: SiteDetailsEnvelope = self
            .request(ApiRequest::new(format!("/site/{site_id}/details")))
            .await?;
        Ok(envelope.details.filter(|d| !d.is_empty()))
    }

    // ==================== Equipment ====================

    pub async fn get_equipment(&self, site_id: SiteId) -> Result<Vec<Reporter>> {
        let envelope: EquipmentEnvelope = self
            .request(ApiRequest::new(format!("/equipment/{site_id}/list")))
            .await?;
        Ok(envelope.reporters.list)
    }

    /// Technical data of one inverter or optimizer.
    pub async fn get_equipment_data(
        &self,
        site_id: SiteId,
        serial_number: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<TelemetrySample>> {
        let request = ApiRequest::new(format!("/equipment/{site_id}/{serial_number}/data"))
            .param("startTime", format_api_datetime(start))
            .param("endTime", format_api_datetime(end));
        let envelope: EquipmentDataEnvelope = self.request(request).await?;
        Ok(envelope.data.telemetries)
    }

    // ==================== Energy and power ====================

    /// Daily energy between two dates, inclusive.
    pub async fn get_energy(
        &self,
        site_id: SiteId,
        start: Date,
        end: Date,
    ) -> Result<Vec<DatedValue>> {
        let request = ApiRequest::new(format!("/site/{site_id}/energy"))
            .param("startDate", format_api_date(start))
            .param("endDate", format_api_date(end))
            .param("timeUnit", "DAY");
        let envelope: EnergyEnvelope = self.request(request).await?;
        Ok(envelope.energy.values)
    }

    /// Quarter-hourly site power.
    pub async fn get_power(
        &self,
        site_id: SiteId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<DatedValue>> {
        let request = ApiRequest::new(format!("/site/{site_id}/power"))
            .param("startTime", format_api_datetime(start))
            .param("endTime", format_api_datetime(end));
        let envelope: PowerEnvelope = self.request(request).await?;
        Ok(envelope.power.values)
    }

    pub async fn get_power_flow(&self, site_id: SiteId) -> Result<Option<PowerFlowSnapshot>> {
        let envelope: PowerFlowEnvelope = self
            .request(ApiRequest::new(format!("/site/{site_id}/currentPowerFlow")))
            .await?;
        Ok(envelope.site_current_power_flow)
    }

    // ==================== Storage and meters ====================

    pub async fn get_storage_data(
        &self,
        site_id: SiteId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<BatteryData>> {
        let request = ApiRequest::new(format!("/site/{site_id}/storageData"))
            .param("startTime", format_api_datetime(start))
            .param("endTime", format_api_datetime(end));
        let envelope: StorageEnvelope = self.request(request).await?;
        Ok(envelope.storage_data.batteries)
    }

    /// Meters of the site with their energy values in the range.
    pub async fn get_meters(
        &self,
        site_id: SiteId,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<MeterSeries>> {
        let request = ApiRequest::new(format!("/site/{site_id}/meters"))
            .param("startTime", format_api_datetime(start))
            .param("endTime", format_api_datetime(end));
        let envelope: MetersEnvelope = self.request(request).await?;
        Ok(envelope.meter_energy_details.meters)
    }

    // ==================== Benefits, alerts, inventory ====================

    /// Environmental benefits; `None` when the body carries none.
    pub async fn get_environmental_benefits(&self, site_id: SiteId) -> Result<Option<EnvBenefits>> {
        let envelope: EnvBenefitsEnvelope = self
            .request(ApiRequest::new(format!("/site/{site_id}/envBenefits")))
            .await?;
        Ok(envelope.env_benefits.filter(|b| !b.is_empty()))
    }

    pub async fn get_alerts(&self, site_id: SiteId) -> Result<Vec<AlertData>> {
        let envelope: AlertsEnvelope = self
            .request(ApiRequest::new(format!("/site/{site_id}/alerts")))
            .await?;
        Ok(envelope.alerts.alert)
    }

    /// Inventory by category. Categories whose value is not a list are
    /// dropped, as are entries that do not decode.
    pub async fn get_inventory(&self, site_id: SiteId) -> Result<Inventory> {
        let envelope: InventoryEnvelope = self
            .request(ApiRequest::new(format!("/site/{site_id}/inventory")))
            .await?;

        let mut inventory = Inventory::new();
        for (category, value) in envelope.inventory {
            let serde_json::Value::Array(items) = value else {
                continue;
            };
            let entries: Vec<InventoryEntry> = items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect();
            inventory.insert(category, entries);
        }
        Ok(inventory)
    }
}
