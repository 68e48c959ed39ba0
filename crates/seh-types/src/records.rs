//! Entity records produced by the sync strategies and written by the store.
//!
//! Every record carries its owning `site_id`; the fields that make up its
//! natural key are listed on each struct. Everything else is a
//! vendor-reported value that is overwritten on re-sync.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::timestamp::start_of_day;
use crate::types::{EquipmentKind, SiteId};

/// Descriptive site metadata. Key: `id`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Site {
    pub id: SiteId,
    pub name: Option<String>,
    pub account_id: Option<i64>,
    pub status: Option<String>,
    pub peak_power: Option<f64>,
    pub currency: Option<String>,
    pub site_type: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub zip_code: Option<String>,
    pub timezone: Option<String>,
    pub installation_date: Option<Date>,
    pub last_update_time: Option<OffsetDateTime>,
    pub primary_module_manufacturer: Option<String>,
    pub primary_module_model: Option<String>,
    pub primary_module_power: Option<f64>,
    pub is_public: Option<bool>,
}

impl Site {
    pub fn new(id: SiteId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Inverter or other reporter. Key: `(site_id, serial_number)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Equipment {
    pub site_id: SiteId,
    pub serial_number: String,
    pub kind: EquipmentKind,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub communication_method: Option<String>,
    pub cpu_version: Option<String>,
    pub connected_optimizers: Option<i64>,
    pub last_report_date: Option<OffsetDateTime>,
}

/// Energy produced over one time unit. Key: `(site_id, reading_date, time_unit)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnergyReading {
    pub site_id: SiteId,
    pub reading_date: Date,
    pub time_unit: String,
    pub energy_wh: f64,
}

/// Site power at one instant. Key: `(site_id, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowerReading {
    pub site_id: SiteId,
    pub timestamp: OffsetDateTime,
    pub power_watts: f64,
}

/// Snapshot of the current power flow. Key: `(site_id, timestamp)` where
/// `timestamp` is the quarter-hour slot of the capture time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PowerFlow {
    pub site_id: SiteId,
    pub timestamp: OffsetDateTime,
    pub unit: Option<String>,
    pub grid_status: Option<String>,
    pub grid_power: Option<f64>,
    pub pv_status: Option<String>,
    pub pv_power: Option<f64>,
    pub load_status: Option<String>,
    pub load_power: Option<f64>,
    pub storage_status: Option<String>,
    pub storage_power: Option<f64>,
    pub storage_charge_level: Option<f64>,
}

/// Battery with its latest telemetry snapshot. Key: `(site_id, serial_number)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Battery {
    pub site_id: SiteId,
    pub serial_number: String,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub nameplate_capacity: Option<f64>,
    pub connected_inverter_sn: Option<String>,
    pub last_power: Option<f64>,
    pub last_state: Option<String>,
    pub last_state_of_charge: Option<f64>,
    pub lifetime_energy_charged: Option<f64>,
    pub lifetime_energy_discharged: Option<f64>,
    pub capacity: Option<f64>,
    pub last_telemetry_time: Option<OffsetDateTime>,
}

/// Meter metadata. Key: `(site_id, name)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Meter {
    pub site_id: SiteId,
    pub name: String,
    pub model: Option<String>,
    pub meter_type: Option<String>,
    pub serial_number: Option<String>,
    pub connected_to: Option<String>,
}

/// One meter energy value. Key: `(site_id, meter_name, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeterReading {
    pub site_id: SiteId,
    pub meter_name: String,
    pub timestamp: OffsetDateTime,
    pub energy_wh: Option<f64>,
}

/// Environmental benefits totals. Key: `site_id` (one row per site).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnvironmentalBenefits {
    pub site_id: SiteId,
    pub trees_planted: Option<f64>,
    pub light_bulbs: Option<f64>,
    pub co2_saved: Option<f64>,
    pub so2_saved: Option<f64>,
    pub nox_saved: Option<f64>,
    pub units: Option<String>,
}

/// Site alert. Key: `(site_id, alert_id)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Alert {
    pub site_id: SiteId,
    pub alert_id: i64,
    pub severity: Option<String>,
    pub alert_code: Option<i64>,
    pub alert_type: Option<String>,
    pub component_name: Option<String>,
    pub message: Option<String>,
    pub serial_number: Option<String>,
    pub alert_timestamp: Option<OffsetDateTime>,
}

/// Inventory entry. Key: `(site_id, name, serial_number)`; the serial is the
/// empty string for components the vendor lists without one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InventoryItem {
    pub site_id: SiteId,
    pub name: String,
    pub serial_number: String,
    pub category: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub cpu_version: Option<String>,
    pub connected_optimizers: Option<i64>,
}

/// Inverter technical sample. Key: `(site_id, serial_number, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InverterTelemetry {
    pub site_id: SiteId,
    pub serial_number: String,
    pub timestamp: OffsetDateTime,
    pub total_active_power: Option<f64>,
    pub total_energy: Option<f64>,
    pub power_limit: Option<f64>,
    pub temperature: Option<f64>,
    pub inverter_mode: Option<String>,
    pub operation_mode: Option<i64>,
    pub ac_current: Option<f64>,
    pub ac_voltage: Option<f64>,
    pub ac_frequency: Option<f64>,
    pub active_power: Option<f64>,
    pub apparent_power: Option<f64>,
    pub reactive_power: Option<f64>,
    pub cos_phi: Option<f64>,
    pub dc_voltage: Option<f64>,
}

/// Optimizer technical sample. Key: `(site_id, serial_number, timestamp)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OptimizerTelemetry {
    pub site_id: SiteId,
    pub serial_number: String,
    pub timestamp: OffsetDateTime,
    pub panel_id: Option<String>,
    pub dc_voltage: Option<f64>,
    pub dc_current: Option<f64>,
    pub dc_power: Option<f64>,
    pub output_voltage: Option<f64>,
    pub output_current: Option<f64>,
    pub output_power: Option<f64>,
    pub energy: Option<f64>,
    pub lifetime_energy: Option<f64>,
    pub temperature: Option<f64>,
    pub optimizer_mode: Option<String>,
}

/// Records mapped from one strategy run, grouped by entity.
///
/// The store writes a batch in a single transaction.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecordBatch {
    pub sites: Vec<Site>,
    pub equipment: Vec<Equipment>,
    pub energy: Vec<EnergyReading>,
    pub power: Vec<PowerReading>,
    pub power_flows: Vec<PowerFlow>,
    pub batteries: Vec<Battery>,
    pub meters: Vec<Meter>,
    pub meter_readings: Vec<MeterReading>,
    pub environmental: Vec<EnvironmentalBenefits>,
    pub alerts: Vec<Alert>,
    pub inventory: Vec<InventoryItem>,
    pub inverter_telemetry: Vec<InverterTelemetry>,
    pub optimizer_telemetry: Vec<OptimizerTelemetry>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
            + self.equipment.len()
            + self.energy.len()
            + self.power.len()
            + self.power_flows.len()
            + self.batteries.len()
            + self.meters.len()
            + self.meter_readings.len()
            + self.environmental.len()
            + self.alerts.len()
            + self.inventory.len()
            + self.inverter_telemetry.len()
            + self.optimizer_telemetry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every record of `other` into this batch.
    pub fn append(&mut self, mut other: RecordBatch) {
        self.sites.append(&mut other.sites);
        self.equipment.append(&mut other.equipment);
        self.energy.append(&mut other.energy);
        self.power.append(&mut other.power);
        self.power_flows.append(&mut other.power_flows);
        self.batteries.append(&mut other.batteries);
        self.meters.append(&mut other.meters);
        self.meter_readings.append(&mut other.meter_readings);
        self.environmental.append(&mut other.environmental);
        self.alerts.append(&mut other.alerts);
        self.inventory.append(&mut other.inventory);
        self.inverter_telemetry.append(&mut other.inverter_telemetry);
        self.optimizer_telemetry.append(&mut other.optimizer_telemetry);
    }

    /// Newest vendor data timestamp carried by the batch.
    ///
    /// Power-flow snapshots, meter metadata, environmental totals and
    /// inventory carry no vendor timestamp and do not contribute; a capture
    /// time must never move the high-water mark past data that has not been
    /// reported yet.
    #[must_use]
    pub fn observed_high_water(&self) -> Option<OffsetDateTime> {
        let sites = self.sites.iter().filter_map(|s| s.last_update_time);
        let equipment = self.equipment.iter().filter_map(|e| e.last_report_date);
        let energy = self.energy.iter().map(|e| start_of_day(e.reading_date));
        let power = self.power.iter().map(|p| p.timestamp);
        let batteries = self.batteries.iter().filter_map(|b| b.last_telemetry_time);
        let meters = self.meter_readings.iter().map(|m| m.timestamp);
        let alerts = self.alerts.iter().filter_map(|a| a.alert_timestamp);
        let inverters = self.inverter_telemetry.iter().map(|t| t.timestamp);
        let optimizers = self.optimizer_telemetry.iter().map(|t| t.timestamp);

        sites
            .chain(equipment)
            .chain(energy)
            .chain(power)
            .chain(batteries)
            .chain(meters)
            .chain(alerts)
            .chain(inverters)
            .chain(optimizers)
            .max()
    }
}
