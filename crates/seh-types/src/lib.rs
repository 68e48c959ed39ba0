//! Domain types for the SolarEdge harvest sync engine.
//!
//! This crate provides the types shared by the API client (seh-core), the
//! SQLite store (seh-store) and the orchestrator (seh-sync).
//!
//! # Features
//!
//! - Data-type tags in their mandatory execution order
//! - Entity records with natural keys, grouped into a [`RecordBatch`]
//! - Parsing and formatting of vendor timestamps
//!
//! # Example
//!
//! ```
//! use seh_types::{DataType, RecordBatch};
//!
//! assert_eq!(DataType::ALL[0], DataType::Site);
//! assert!(RecordBatch::new().observed_high_water().is_none());
//! ```

pub mod error;
pub mod records;
pub mod timestamp;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use records::{
    Alert, Battery, EnergyReading, EnvironmentalBenefits, Equipment, InventoryItem,
    InverterTelemetry, Meter, MeterReading, OptimizerTelemetry, PowerFlow, PowerReading,
    RecordBatch, Site,
};
pub use timestamp::{
    format_api_date, format_api_datetime, parse_date, parse_timestamp, quarter_hour_slot,
    start_of_day,
};
pub use types::{DataType, EquipmentKind, EquipmentRef, SiteId, SyncStatus};
