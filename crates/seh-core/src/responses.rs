//! Typed response bodies of the monitoring API.
//!
//! Only the fields the sync engine maps are modelled; unknown fields are
//! ignored. Wrapper objects default to empty so a missing section reads as
//! "no data" rather than a decode failure. Lists that the vendor collapses
//! to a single object when they have one element go through
//! [`one_or_many`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Accept either a JSON array or a single object and always yield a list.
pub fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
    })
}

/// Render a scalar JSON value (string or number) as text.
pub fn scalar_to_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SitesEnvelope {
    #[serde(default)]
    pub sites: SitesList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SitesList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub site: Vec<SiteDetails>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SiteDetailsEnvelope {
    #[serde(default)]
    pub details: Option<SiteDetails>,
}

/// Site description as returned by `/sites/list` and `/site/{id}/details`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDetails {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub account_id: Option<i64>,
    pub status: Option<String>,
    pub peak_power: Option<f64>,
    pub last_update_time: Option<String>,
    pub installation_date: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "type")]
    pub site_type: Option<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub primary_module: PrimaryModule,
    #[serde(default)]
    pub public_settings: PublicSettings,
}

impl SiteDetails {
    /// True when the vendor returned an empty details object.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub zip: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryModule {
    pub manufacturer_name: Option<String>,
    pub model_name: Option<String>,
    pub maximum_power: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub is_public: Option<bool>,
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EquipmentEnvelope {
    #[serde(default)]
    pub reporters: ReporterList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReporterList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub list: Vec<Reporter>,
}

/// One entry of `/equipment/{id}/list`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reporter {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    #[serde(alias = "SN")]
    pub serial_number: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub communication_method: Option<String>,
    pub cpu_version: Option<String>,
    pub connected_optimizers: Option<i64>,
    pub last_report_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EquipmentDataEnvelope {
    #[serde(default)]
    pub data: EquipmentData,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EquipmentData {
    #[serde(default, deserialize_with = "one_or_many")]
    pub telemetries: Vec<TelemetrySample>,
}

/// One technical sample of `/equipment/{site}/{serial}/data`.
///
/// Inverters and optimizers report different subsets of these fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub date: Option<String>,
    pub total_active_power: Option<f64>,
    pub total_energy: Option<f64>,
    pub power_limit: Option<f64>,
    pub temperature: Option<f64>,
    pub inverter_mode: Option<String>,
    pub operation_mode: Option<i64>,
    pub dc_voltage: Option<f64>,
    #[serde(rename = "L1Data")]
    pub l1_data: Option<PhaseData>,
    pub panel_id: Option<Value>,
    pub dc_current: Option<f64>,
    pub dc_power: Option<f64>,
    pub output_voltage: Option<f64>,
    pub output_current: Option<f64>,
    pub output_power: Option<f64>,
    pub energy: Option<f64>,
    pub lifetime_energy: Option<f64>,
    pub optimizer_mode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseData {
    pub ac_current: Option<f64>,
    pub ac_voltage: Option<f64>,
    pub ac_frequency: Option<f64>,
    pub apparent_power: Option<f64>,
    pub active_power: Option<f64>,
    pub reactive_power: Option<f64>,
    pub cos_phi: Option<f64>,
}

// ---------------------------------------------------------------------------
// Energy and power
// ---------------------------------------------------------------------------

/// A `{ "date": ..., "value": ... }` pair; `value` is null for gaps.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatedValue {
    pub date: Option<String>,
    pub value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EnergyEnvelope {
    #[serde(default)]
    pub energy: Series,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PowerEnvelope {
    #[serde(default)]
    pub power: Series,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Series {
    #[serde(default)]
    pub values: Vec<DatedValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PowerFlowEnvelope {
    #[serde(default)]
    pub site_current_power_flow: Option<PowerFlowSnapshot>,
}

/// Body of `/site/{id}/currentPowerFlow`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PowerFlowSnapshot {
    pub unit: Option<String>,
    #[serde(rename = "GRID")]
    pub grid: Option<FlowNode>,
    #[serde(rename = "PV")]
    pub pv: Option<FlowNode>,
    #[serde(rename = "LOAD")]
    pub load: Option<FlowNode>,
    #[serde(rename = "STORAGE")]
    pub storage: Option<FlowNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub status: Option<String>,
    pub current_power: Option<f64>,
    pub charge_level: Option<f64>,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StorageEnvelope {
    #[serde(default)]
    pub storage_data: StorageData,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StorageData {
    #[serde(default, deserialize_with = "one_or_many")]
    pub batteries: Vec<BatteryData>,
}

/// One battery of `/site/{id}/storageData`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryData {
    pub serial_number: Option<String>,
    pub name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub model_number: Option<String>,
    pub nameplate: Option<f64>,
    pub connected_inverter_sn: Option<String>,
    #[serde(default)]
    pub telemetries: Vec<BatteryTelemetry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryTelemetry {
    pub time_stamp: Option<String>,
    pub power: Option<f64>,
    pub battery_state: Option<Value>,
    pub battery_percentage_state: Option<f64>,
    pub life_time_energy_charged: Option<f64>,
    pub life_time_energy_discharged: Option<f64>,
    pub full_pack_energy_available: Option<f64>,
}

// ---------------------------------------------------------------------------
// Meters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetersEnvelope {
    #[serde(default)]
    pub meter_energy_details: MeterEnergyDetails,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MeterEnergyDetails {
    #[serde(default, deserialize_with = "one_or_many")]
    pub meters: Vec<MeterSeries>,
}

/// One meter of `/site/{id}/meters` with its energy values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterSeries {
    pub name: Option<String>,
    pub meter_serial_number: Option<String>,
    #[serde(rename = "connectedSolaredgeDeviceSN")]
    pub connected_device_sn: Option<String>,
    pub model: Option<String>,
    pub meter_type: Option<String>,
    #[serde(default)]
    pub values: Vec<DatedValue>,
}

impl MeterSeries {
    /// Stable name for the meter: explicit name, else type, else serial.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.meter_type.as_deref())
            .or(self.meter_serial_number.as_deref())
            .filter(|n| !n.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Environmental benefits, alerts, inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnvBenefitsEnvelope {
    #[serde(default)]
    pub env_benefits: Option<EnvBenefits>,
}

/// Body of `/site/{id}/envBenefits`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvBenefits {
    pub gas_emission_saved: Option<GasEmission>,
    pub trees_planted: Option<f64>,
    pub light_bulbs: Option<f64>,
}

impl EnvBenefits {
    pub fn is_empty(&self) -> bool {
        self.gas_emission_saved.is_none()
            && self.trees_planted.is_none()
            && self.light_bulbs.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GasEmission {
    pub units: Option<String>,
    pub co2: Option<f64>,
    pub so2: Option<f64>,
    pub nox: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AlertsEnvelope {
    #[serde(default)]
    pub alerts: AlertList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AlertList {
    #[serde(default, deserialize_with = "one_or_many")]
    pub alert: Vec<AlertData>,
}

/// One alert of `/site/{id}/alerts`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertData {
    pub alert_id: Option<i64>,
    pub severity: Option<Value>,
    pub alert_code: Option<i64>,
    pub alert_type: Option<String>,
    pub component_name: Option<String>,
    pub message: Option<String>,
    pub component_serial_number: Option<String>,
    pub alert_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InventoryEnvelope {
    #[serde(default, rename = "Inventory")]
    pub inventory: BTreeMap<String, Value>,
}

/// One component of `/site/{id}/inventory`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    #[serde(alias = "SN")]
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub cpu_version: Option<String>,
    pub connected_optimizers: Option<i64>,
}

/// Inventory grouped by vendor category (`inverters`, `meters`, ...).
pub type Inventory = BTreeMap<String, Vec<InventoryEntry>>;
