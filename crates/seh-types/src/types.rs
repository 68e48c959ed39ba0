//! Core tags shared by the API client, the store and the orchestrator.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Vendor site identifier.
pub type SiteId = u64;

/// One category of harvested information, each handled by one sync strategy.
///
/// The declaration order is the mandatory per-site execution order: later
/// data types consume identifiers produced by earlier ones (telemetry needs
/// the equipment serial numbers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DataType {
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

impl DataType {
    /// Every data type, in execution order.
    pub const ALL: [DataType; 11] = [
        DataType::Site,
        DataType::Equipment,
        DataType::Energy,
        DataType::Power,
        DataType::Storage,
        DataType::Meter,
        DataType::Environmental,
        DataType::Alert,
        DataType::Inventory,
        DataType::InverterTelemetry,
        DataType::OptimizerTelemetry,
    ];

    /// The tag persisted in the cursor table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Site => "site",
            DataType::Equipment => "equipment",
            DataType::Energy => "energy",
            DataType::Power => "power",
            DataType::Storage => "storage",
            DataType::Meter => "meter",
            DataType::Environmental => "environmental",
            DataType::Alert => "alert",
            DataType::Inventory => "inventory",
            DataType::InverterTelemetry => "inverter_telemetry",
            DataType::OptimizerTelemetry => "optimizer_telemetry",
        }
    }

    /// Whether this data type reads equipment identifiers produced by
    /// [`DataType::Equipment`] earlier in the same run.
    #[must_use]
    pub fn depends_on_equipment(&self) -> bool {
        matches!(
            self,
            DataType::InverterTelemetry | DataType::OptimizerTelemetry
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    /// Parses a tag case-insensitively. `storage`/`battery` and the plural
    /// `meters`/`alerts` are accepted as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let data_type = match normalized.as_str() {
            "site" | "sites" => DataType::Site,
            "equipment" => DataType::Equipment,
            "energy" => DataType::Energy,
            "power" => DataType::Power,
            "storage" | "battery" => DataType::Storage,
            "meter" | "meters" => DataType::Meter,
            "environmental" => DataType::Environmental,
            "alert" | "alerts" => DataType::Alert,
            "inventory" => DataType::Inventory,
            "inverter_telemetry" => DataType::InverterTelemetry,
            "optimizer_telemetry" => DataType::OptimizerTelemetry,
            _ => return Err(ParseError::UnknownDataType(s.to_string())),
        };
        Ok(data_type)
    }
}

/// Outcome recorded on a cursor after a strategy attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SyncStatus {
    /// Fetch and persist completed.
    Success,
    /// Data was persisted but an optional part of the fetch failed.
    Partial,
    /// The strategy failed; the high-water mark was not advanced.
    Error,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Partial => "partial",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncStatus::Success),
            "partial" => Ok(SyncStatus::Partial),
            "error" => Ok(SyncStatus::Error),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind of equipment reported by the equipment list and inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EquipmentKind {
    Inverter,
    Optimizer,
    Other,
}

impl EquipmentKind {
    /// Classify the vendor's free-form `type` field. A missing type means
    /// an inverter, which is what the equipment list reports by default.
    #[must_use]
    pub fn from_vendor(kind: Option<&str>) -> Self {
        match kind.map(|k| k.trim().to_ascii_lowercase()) {
            None => EquipmentKind::Inverter,
            Some(k) if k.is_empty() || k.contains("inverter") => EquipmentKind::Inverter,
            Some(k) if k.contains("optimizer") => EquipmentKind::Optimizer,
            Some(_) => EquipmentKind::Other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentKind::Inverter => "Inverter",
            EquipmentKind::Optimizer => "Optimizer",
            EquipmentKind::Other => "Other",
        }
    }
}

impl fmt::Display for EquipmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of equipment as seen by the telemetry strategies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EquipmentRef {
    pub serial_number: String,
    pub kind: EquipmentKind,
}

impl EquipmentRef {
    pub fn new(serial_number: impl Into<String>, kind: EquipmentKind) -> Self {
        Self {
            serial_number: serial_number.into(),
            kind,
        }
    }
}
