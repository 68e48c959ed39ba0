//! Per-data-type sync strategies.
//!
//! The set of data types is fixed, so strategies are a closed enum rather
//! than trait objects. [`Strategy::REGISTRY`] lists them in the order the
//! orchestrator must run them for each site: telemetry reads the equipment
//! serial numbers that the equipment strategy stores earlier in the same
//! run.
//!
//! A strategy has two halves:
//!
//! - [`Strategy::fetch`] issues the API calls for one window and returns the
//!   raw [`Payload`]. It never touches the store.
//! - [`Strategy::map`] turns a payload into entity records. It is pure;
//!   items that cannot be mapped (no date, no value, no serial) are dropped
//!   with a warning.

mod alert;
mod energy;
mod environmental;
mod equipment;
mod inventory;
mod meter;
mod power;
mod site;
mod storage;
mod telemetry;

use time::{Duration, OffsetDateTime};

use seh_core::responses::{
    AlertData, BatteryData, DatedValue, EnvBenefits, Inventory, MeterSeries, Reporter,
    SiteDetails,
};
use seh_core::{SolarEdgeClient, Transport};
use seh_types::{DataType, EquipmentKind, EquipmentRef, RecordBatch, SiteId};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::window::FetchWindow;

pub use power::PowerPayload;
pub use telemetry::SerialSamples;

/// One sync strategy per data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Site,
    Equipment,
    Energy,
    Power,
    Storage,
    Meter,
    Environmental,
    Alert,
    Inventory,
    InverterTelemetry,
    OptimizerTelemetry,
}

impl Strategy {
    /// Every strategy, in mandatory execution order.
    pub const REGISTRY: [Strategy; 11] = [
        Strategy::Site,
        Strategy::Equipment,
        Strategy::Energy,
        Strategy::Power,
        Strategy::Storage,
        Strategy::Meter,
        Strategy::Environmental,
        Strategy::Alert,
        Strategy::Inventory,
        Strategy::InverterTelemetry,
        Strategy::OptimizerTelemetry,
    ];

    pub fn data_type(self) -> DataType {
        match self {
            Strategy::Site => DataType::Site,
            Strategy::Equipment => DataType::Equipment,
            Strategy::Energy => DataType::Energy,
            Strategy::Power => DataType::Power,
            Strategy::Storage => DataType::Storage,
            Strategy::Meter => DataType::Meter,
            Strategy::Environmental => DataType::Environmental,
            Strategy::Alert => DataType::Alert,
            Strategy::Inventory => DataType::Inventory,
            Strategy::InverterTelemetry => DataType::InverterTelemetry,
            Strategy::OptimizerTelemetry => DataType::OptimizerTelemetry,
        }
    }

    pub fn for_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Site => Strategy::Site,
            DataType::Equipment => Strategy::Equipment,
            DataType::Energy => Strategy::Energy,
            DataType::Power => Strategy::Power,
            DataType::Storage => Strategy::Storage,
            DataType::Meter => Strategy::Meter,
            DataType::Environmental => Strategy::Environmental,
            DataType::Alert => Strategy::Alert,
            DataType::Inventory => Strategy::Inventory,
            DataType::InverterTelemetry => Strategy::InverterTelemetry,
            DataType::OptimizerTelemetry => Strategy::OptimizerTelemetry,
        }
    }

    /// Window length used when no cursor exists or on a `full` run.
    ///
    /// Snapshot strategies (site, equipment, benefits, alerts, inventory)
    /// fetch the vendor's current state and ignore their window.
    pub fn lookback(self, config: &SyncConfig) -> Duration {
        let days = match self {
            Strategy::Energy => config.energy_lookback_days,
            Strategy::InverterTelemetry | Strategy::OptimizerTelemetry => {
                config.telemetry_lookback_days
            }
            _ => config.power_lookback_days,
        };
        Duration::days(i64::from(days))
    }

    /// Longest range the vendor accepts in one call, for windowed strategies.
    pub fn chunk_span(self) -> Option<Duration> {
        match self {
            Strategy::Energy => Some(Duration::days(365)),
            Strategy::Power | Strategy::Meter => Some(Duration::days(30)),
            Strategy::Storage | Strategy::InverterTelemetry | Strategy::OptimizerTelemetry => {
                Some(Duration::days(7))
            }
            _ => None,
        }
    }

    /// Equipment whose serial numbers this strategy iterates over.
    pub fn equipment_kind(self) -> Option<EquipmentKind> {
        match self {
            Strategy::InverterTelemetry => Some(EquipmentKind::Inverter),
            Strategy::OptimizerTelemetry => Some(EquipmentKind::Optimizer),
            _ => None,
        }
    }

    /// Fetch the raw payload for `input.window`.
    pub async fn fetch<T: Transport>(
        self,
        client: &SolarEdgeClient<T>,
        input: &StrategyInput,
    ) -> Result<Payload, SyncError> {
        let site_id = input.site_id;
        let payload = match self {
            Strategy::Site => Payload::Site(site::fetch(client, site_id).await?),
            Strategy::Equipment => Payload::Equipment(client.get_equipment(site_id).await?),
            Strategy::Energy => Payload::Energy(energy::fetch(client, input).await?),
            Strategy::Power => Payload::Power(power::fetch(client, input).await?),
            Strategy::Storage => Payload::Storage(storage::fetch(client, input).await?),
            Strategy::Meter => match meter::fetch(client, input).await {
                Err(e) if not_available(&e, &[400]) => Payload::Unavailable,
                other => Payload::Meter(other?),
            },
            Strategy::Environmental => match client.get_environmental_benefits(site_id).await {
                Err(e) if not_available(&e, &[400]) => Payload::Unavailable,
                Ok(benefits) => Payload::Environmental(
                    benefits.ok_or_else(|| SyncError::Validation("No data returned".into()))?,
                ),
                Err(e) => return Err(e.into()),
            },
            Strategy::Alert => match client.get_alerts(site_id).await {
                Err(e) if not_available(&e, &[400, 403]) => Payload::Unavailable,
                other => Payload::Alert(other?),
            },
            Strategy::Inventory => match client.get_inventory(site_id).await {
                Err(e) if not_available(&e, &[400]) => Payload::Unavailable,
                other => Payload::Inventory(other?),
            },
            Strategy::InverterTelemetry => {
                Payload::InverterTelemetry(telemetry::fetch(client, input).await?)
            }
            Strategy::OptimizerTelemetry => {
                Payload::OptimizerTelemetry(telemetry::fetch(client, input).await?)
            }
        };
        Ok(payload)
    }

    /// Map a payload to entity records owned by `site_id`.
    pub fn map(site_id: SiteId, payload: Payload) -> StrategyOutput {
        match payload {
            Payload::Unavailable => StrategyOutput::default(),
            Payload::Site(details) => site::map(site_id, details),
            Payload::Equipment(reporters) => equipment::map(site_id, reporters),
            Payload::Energy(values) => energy::map(site_id, values),
            Payload::Power(power) => power::map(site_id, power),
            Payload::Storage(batteries) => storage::map(site_id, batteries),
            Payload::Meter(meters) => meter::map(site_id, meters),
            Payload::Environmental(benefits) => environmental::map(site_id, benefits),
            Payload::Alert(alerts) => alert::map(site_id, alerts),
            Payload::Inventory(inventory) => inventory::map(site_id, inventory),
            Payload::InverterTelemetry(samples) => telemetry::map_inverter(site_id, samples),
            Payload::OptimizerTelemetry(samples) => telemetry::map_optimizer(site_id, samples),
        }
    }
}

/// Everything a strategy needs to fetch one `(site, data_type)`.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub site_id: SiteId,
    pub window: FetchWindow,
    /// Wall-clock time of the run; keys the power-flow snapshot.
    pub captured_at: OffsetDateTime,
    /// Known serial numbers, for the telemetry strategies.
    pub equipment: Vec<EquipmentRef>,
}

impl StrategyInput {
    /// The window split to the range limit of `strategy`.
    pub fn chunks(&self, strategy: Strategy) -> Vec<FetchWindow> {
        match strategy.chunk_span() {
            Some(span) => self.window.chunks(span),
            None => vec![self.window],
        }
    }
}

/// Raw vendor data returned by [`Strategy::fetch`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// The endpoint is not offered for this site.
    Unavailable,
    Site(SiteDetails),
    Equipment(Vec<Reporter>),
    Energy(Vec<DatedValue>),
    Power(PowerPayload),
    Storage(Vec<BatteryData>),
    Meter(Vec<MeterSeries>),
    Environmental(EnvBenefits),
    Alert(Vec<AlertData>),
    Inventory(Inventory),
    InverterTelemetry(Vec<SerialSamples>),
    OptimizerTelemetry(Vec<SerialSamples>),
}

/// Records mapped from one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    pub batch: RecordBatch,
    /// Non-fatal problems; any warning downgrades the outcome to partial.
    pub warnings: Vec<String>,
}

/// True when `err` means the vendor does not offer the endpoint for the site.
fn not_available(err: &seh_core::Error, statuses: &[u16]) -> bool {
    matches!(err, seh_core::Error::Permanent { status, .. } if statuses.contains(status))
}
