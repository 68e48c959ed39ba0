//! Natural-key description of every persisted entity.
//!
//! [`Entity`] tells the store which table a record lives in, which columns
//! form its natural key and how to turn it into a row. The store has one
//! write path for all of them: [`upsert_rows`] de-duplicates by key and
//! issues `INSERT ... ON CONFLICT(key) DO UPDATE`, so re-applying a batch
//! refreshes values without ever adding a row.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use time::{Date, OffsetDateTime};

use seh_types::{
    Alert, Battery, EnergyReading, EnvironmentalBenefits, Equipment, InventoryItem,
    InverterTelemetry, Meter, MeterReading, OptimizerTelemetry, PowerFlow, PowerReading, Site,
    SiteId, format_api_date,
};

use crate::error::Result;

/// A record type with a natural key and a table of its own.
///
/// The first key column always holds the owning site identifier; the store
/// relies on that for per-site counts and for creating the parent site row.
pub trait Entity {
    /// Table the records are stored in.
    const TABLE: &'static str;
    /// Columns of the `UNIQUE` natural-key constraint, site column first.
    const KEY_COLUMNS: &'static [&'static str];
    /// Columns overwritten when a record with the same key is written again.
    const VALUE_COLUMNS: &'static [&'static str];
    /// Value columns whose stored value survives a later write of `NULL`.
    const KEEP_WHEN_NULL: &'static [&'static str] = &[];

    type Key: Eq + Hash;

    fn site_id(&self) -> SiteId;

    fn natural_key(&self) -> Self::Key;

    /// Column values in `KEY_COLUMNS` then `VALUE_COLUMNS` order.
    fn to_row(&self) -> Vec<Value>;
}

/// Write `records` under natural-key conflict resolution.
///
/// Later records win over earlier ones with the same key. Owning site rows
/// are created when missing. Returns the number of distinct keys written.
/// The caller owns the transaction.
pub(crate) fn upsert_rows<E: Entity>(
    conn: &Connection,
    records: &[E],
    synced_at: i64,
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut slots: HashMap<E::Key, usize> = HashMap::with_capacity(records.len());
    let mut latest: Vec<&E> = Vec::with_capacity(records.len());
    for record in records {
        match slots.entry(record.natural_key()) {
            Entry::Occupied(slot) => latest[*slot.get()] = record,
            Entry::Vacant(slot) => {
                slot.insert(latest.len());
                latest.push(record);
            }
        }
    }

    let mut ensure_site =
        conn.prepare_cached("INSERT OR IGNORE INTO sites (id, synced_at) VALUES (?1, ?2)")?;
    let mut seen_sites = Vec::new();
    for record in &latest {
        let site_id = record.site_id();
        if !seen_sites.contains(&site_id) {
            ensure_site.execute(rusqlite::params![site_value(site_id), synced_at])?;
            seen_sites.push(site_id);
        }
    }

    let sql = upsert_sql::<E>();
    let mut stmt = conn.prepare_cached(&sql)?;
    for record in &latest {
        let mut row = record.to_row();
        row.push(Value::Integer(synced_at));
        stmt.execute(params_from_iter(row))?;
    }

    Ok(latest.len())
}

fn upsert_sql<E: Entity>() -> String {
    let columns: Vec<&str> = E::KEY_COLUMNS
        .iter()
        .chain(E::VALUE_COLUMNS)
        .copied()
        .chain(std::iter::once("synced_at"))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let updates: Vec<String> = E::VALUE_COLUMNS
        .iter()
        .copied()
        .chain(std::iter::once("synced_at"))
        .map(|c| {
            if E::KEEP_WHEN_NULL.contains(&c) {
                format!("{c} = COALESCE(excluded.{c}, {c})")
            } else {
                format!("{c} = excluded.{c}")
            }
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        E::TABLE,
        columns.join(", "),
        placeholders.join(", "),
        E::KEY_COLUMNS.join(", "),
        updates.join(", "),
    )
}

pub(crate) fn site_value(id: SiteId) -> Value {
    Value::Integer(id as i64)
}

fn text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

fn real(value: Option<f64>) -> Value {
    value.map_or(Value::Null, Value::Real)
}

fn integer(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

fn unix(ts: OffsetDateTime) -> Value {
    Value::Integer(ts.unix_timestamp())
}

fn unix_opt(ts: Option<OffsetDateTime>) -> Value {
    ts.map_or(Value::Null, unix)
}

fn date(value: Date) -> Value {
    Value::Text(format_api_date(value))
}

impl Entity for Site {
    const TABLE: &'static str = "sites";
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "name",
        "account_id",
        "status",
        "peak_power",
        "currency",
        "site_type",
        "country",
        "city",
        "address",
        "zip_code",
        "timezone",
        "installation_date",
        "last_update_time",
        "primary_module_manufacturer",
        "primary_module_model",
        "primary_module_power",
        "is_public",
    ];
    type Key = SiteId;

    fn site_id(&self) -> SiteId {
        self.id
    }

    fn natural_key(&self) -> SiteId {
        self.id
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.id),
            text(&self.name),
            integer(self.account_id),
            text(&self.status),
            real(self.peak_power),
            text(&self.currency),
            text(&self.site_type),
            text(&self.country),
            text(&self.city),
            text(&self.address),
            text(&self.zip_code),
            text(&self.timezone),
            self.installation_date.map_or(Value::Null, date),
            unix_opt(self.last_update_time),
            text(&self.primary_module_manufacturer),
            text(&self.primary_module_model),
            real(self.primary_module_power),
            integer(self.is_public.map(i64::from)),
        ]
    }
}

impl Entity for Equipment {
    const TABLE: &'static str = "equipment";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "serial_number"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "kind",
        "name",
        "manufacturer",
        "model",
        "communication_method",
        "cpu_version",
        "connected_optimizers",
        "last_report_date",
    ];
    type Key = (SiteId, String);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.serial_number.clone())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.serial_number.clone()),
            Value::Text(self.kind.as_str().to_string()),
            text(&self.name),
            text(&self.manufacturer),
            text(&self.model),
            text(&self.communication_method),
            text(&self.cpu_version),
            integer(self.connected_optimizers),
            unix_opt(self.last_report_date),
        ]
    }
}

impl Entity for EnergyReading {
    const TABLE: &'static str = "energy_readings";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "reading_date", "time_unit"];
    const VALUE_COLUMNS: &'static [&'static str] = &["energy_wh"];
    type Key = (SiteId, Date, String);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.reading_date, self.time_unit.clone())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            date(self.reading_date),
            Value::Text(self.time_unit.clone()),
            Value::Real(self.energy_wh),
        ]
    }
}

impl Entity for PowerReading {
    const TABLE: &'static str = "power_readings";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "timestamp"];
    const VALUE_COLUMNS: &'static [&'static str] = &["power_watts"];
    type Key = (SiteId, i64);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.timestamp.unix_timestamp())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            unix(self.timestamp),
            Value::Real(self.power_watts),
        ]
    }
}

impl Entity for PowerFlow {
    const TABLE: &'static str = "power_flows";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "timestamp"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "unit",
        "grid_status",
        "grid_power",
        "pv_status",
        "pv_power",
        "load_status",
        "load_power",
        "storage_status",
        "storage_power",
        "storage_charge_level",
    ];
    type Key = (SiteId, i64);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.timestamp.unix_timestamp())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            unix(self.timestamp),
            text(&self.unit),
            text(&self.grid_status),
            real(self.grid_power),
            text(&self.pv_status),
            real(self.pv_power),
            text(&self.load_status),
            real(self.load_power),
            text(&self.storage_status),
            real(self.storage_power),
            real(self.storage_charge_level),
        ]
    }
}

impl Entity for Battery {
    const TABLE: &'static str = "batteries";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "serial_number"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "name",
        "manufacturer",
        "model",
        "nameplate_capacity",
        "connected_inverter_sn",
        "last_power",
        "last_state",
        "last_state_of_charge",
        "lifetime_energy_charged",
        "lifetime_energy_discharged",
        "capacity",
        "last_telemetry_time",
    ];
    // A listing without telemetry must not wipe the last snapshot.
    const KEEP_WHEN_NULL: &'static [&'static str] = &[
        "last_power",
        "last_state",
        "last_state_of_charge",
        "lifetime_energy_charged",
        "lifetime_energy_discharged",
        "capacity",
        "last_telemetry_time",
    ];
    type Key = (SiteId, String);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.serial_number.clone())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.serial_number.clone()),
            text(&self.name),
            text(&self.manufacturer),
            text(&self.model),
            real(self.nameplate_capacity),
            text(&self.connected_inverter_sn),
            real(self.last_power),
            text(&self.last_state),
            real(self.last_state_of_charge),
            real(self.lifetime_energy_charged),
            real(self.lifetime_energy_discharged),
            real(self.capacity),
            unix_opt(self.last_telemetry_time),
        ]
    }
}

impl Entity for Meter {
    const TABLE: &'static str = "meters";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "name"];
    const VALUE_COLUMNS: &'static [&'static str] =
        &["model", "meter_type", "serial_number", "connected_to"];
    type Key = (SiteId, String);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.name.clone())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.name.clone()),
            text(&self.model),
            text(&self.meter_type),
            text(&self.serial_number),
            text(&self.connected_to),
        ]
    }
}

impl Entity for MeterReading {
    const TABLE: &'static str = "meter_readings";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "meter_name", "timestamp"];
    const VALUE_COLUMNS: &'static [&'static str] = &["energy_wh"];
    type Key = (SiteId, String, i64);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.site_id,
            self.meter_name.clone(),
            self.timestamp.unix_timestamp(),
        )
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.meter_name.clone()),
            unix(self.timestamp),
            real(self.energy_wh),
        ]
    }
}

impl Entity for EnvironmentalBenefits {
    const TABLE: &'static str = "environmental_benefits";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "trees_planted",
        "light_bulbs",
        "co2_saved",
        "so2_saved",
        "nox_saved",
        "units",
    ];
    type Key = SiteId;

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> SiteId {
        self.site_id
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            real(self.trees_planted),
            real(self.light_bulbs),
            real(self.co2_saved),
            real(self.so2_saved),
            real(self.nox_saved),
            text(&self.units),
        ]
    }
}

impl Entity for Alert {
    const TABLE: &'static str = "alerts";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "alert_id"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "severity",
        "alert_code",
        "alert_type",
        "component_name",
        "message",
        "serial_number",
        "alert_timestamp",
    ];
    type Key = (SiteId, i64);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.alert_id)
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Integer(self.alert_id),
            text(&self.severity),
            integer(self.alert_code),
            text(&self.alert_type),
            text(&self.component_name),
            text(&self.message),
            text(&self.serial_number),
            unix_opt(self.alert_timestamp),
        ]
    }
}

impl Entity for InventoryItem {
    const TABLE: &'static str = "inventory_items";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "name", "serial_number"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "category",
        "manufacturer",
        "model",
        "firmware_version",
        "cpu_version",
        "connected_optimizers",
    ];
    type Key = (SiteId, String, String);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (self.site_id, self.name.clone(), self.serial_number.clone())
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.name.clone()),
            Value::Text(self.serial_number.clone()),
            Value::Text(self.category.clone()),
            text(&self.manufacturer),
            text(&self.model),
            text(&self.firmware_version),
            text(&self.cpu_version),
            integer(self.connected_optimizers),
        ]
    }
}

impl Entity for InverterTelemetry {
    const TABLE: &'static str = "inverter_telemetry";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "serial_number", "timestamp"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "total_active_power",
        "total_energy",
        "power_limit",
        "temperature",
        "inverter_mode",
        "operation_mode",
        "ac_current",
        "ac_voltage",
        "ac_frequency",
        "active_power",
        "apparent_power",
        "reactive_power",
        "cos_phi",
        "dc_voltage",
    ];
    type Key = (SiteId, String, i64);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.site_id,
            self.serial_number.clone(),
            self.timestamp.unix_timestamp(),
        )
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.serial_number.clone()),
            unix(self.timestamp),
            real(self.total_active_power),
            real(self.total_energy),
            real(self.power_limit),
            real(self.temperature),
            text(&self.inverter_mode),
            integer(self.operation_mode),
            real(self.ac_current),
            real(self.ac_voltage),
            real(self.ac_frequency),
            real(self.active_power),
            real(self.apparent_power),
            real(self.reactive_power),
            real(self.cos_phi),
            real(self.dc_voltage),
        ]
    }
}

impl Entity for OptimizerTelemetry {
    const TABLE: &'static str = "optimizer_telemetry";
    const KEY_COLUMNS: &'static [&'static str] = &["site_id", "serial_number", "timestamp"];
    const VALUE_COLUMNS: &'static [&'static str] = &[
        "panel_id",
        "dc_voltage",
        "dc_current",
        "dc_power",
        "output_voltage",
        "output_current",
        "output_power",
        "energy",
        "lifetime_energy",
        "temperature",
        "optimizer_mode",
    ];
    type Key = (SiteId, String, i64);

    fn site_id(&self) -> SiteId {
        self.site_id
    }

    fn natural_key(&self) -> Self::Key {
        (
            self.site_id,
            self.serial_number.clone(),
            self.timestamp.unix_timestamp(),
        )
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            site_value(self.site_id),
            Value::Text(self.serial_number.clone()),
            unix(self.timestamp),
            text(&self.panel_id),
            real(self.dc_voltage),
            real(self.dc_current),
            real(self.dc_power),
            real(self.output_voltage),
            real(self.output_current),
            real(self.output_power),
            real(self.energy),
            real(self.lifetime_energy),
            real(self.temperature),
            text(&self.optimizer_mode),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_row_matches_columns<E: Entity>(record: &E) {
        assert_eq!(
            record.to_row().len(),
            E::KEY_COLUMNS.len() + E::VALUE_COLUMNS.len(),
            "{}",
            E::TABLE
        );
    }

    #[test]
    fn test_rows_match_declared_columns() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert_row_matches_columns(&Site::new(1));
        assert_row_matches_columns(&PowerReading {
            site_id: 1,
            timestamp: now,
            power_watts: 1.0,
        });
        assert_row_matches_columns(&EnergyReading {
            site_id: 1,
            reading_date: now.date(),
            time_unit: "DAY".into(),
            energy_wh: 1.0,
        });
        assert_row_matches_columns(&InventoryItem {
            site_id: 1,
            name: "Inverter 1".into(),
            serial_number: String::new(),
            category: "inverters".into(),
            manufacturer: None,
            model: None,
            firmware_version: None,
            cpu_version: None,
            connected_optimizers: None,
        });
        assert_row_matches_columns(&OptimizerTelemetry {
            site_id: 1,
            serial_number: "OPT".into(),
            timestamp: now,
            panel_id: None,
            dc_voltage: None,
            dc_current: None,
            dc_power: None,
            output_voltage: None,
            output_current: None,
            output_power: None,
            energy: None,
            lifetime_energy: None,
            temperature: None,
            optimizer_mode: None,
        });
    }

    #[test]
    fn test_upsert_sql_targets_natural_key() {
        let sql = upsert_sql::<PowerReading>();
        assert_eq!(
            sql,
            "INSERT INTO power_readings (site_id, timestamp, power_watts, synced_at) \
             VALUES (?1, ?2, ?3, ?4) ON CONFLICT(site_id, timestamp) DO UPDATE SET \
             power_watts = excluded.power_watts, synced_at = excluded.synced_at"
        );
    }

    #[test]
    fn test_snapshot_columns_keep_stored_value_on_null() {
        let sql = upsert_sql::<Battery>();
        assert!(sql.contains("last_power = COALESCE(excluded.last_power, last_power)"));
        assert!(sql.contains(
            "last_telemetry_time = COALESCE(excluded.last_telemetry_time, last_telemetry_time)"
        ));
        assert!(sql.contains("name = excluded.name"));
    }
}
