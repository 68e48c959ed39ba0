//! Database schema.
//!
//! Every child table carries a `UNIQUE` constraint over its natural key; the
//! upsert path in [`crate::entity`] targets exactly those columns in its
//! `ON CONFLICT` clause. Children reference `sites(id)` with
//! `ON DELETE CASCADE`, which only takes effect while
//! `PRAGMA foreign_keys` is on.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Create the schema on a fresh database, or verify the version of an
/// existing one.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version > SCHEMA_VERSION {
        return Err(Error::UnsupportedSchema {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sites (
            id INTEGER PRIMARY KEY,
            name TEXT,
            account_id INTEGER,
            status TEXT,
            peak_power REAL,
            currency TEXT,
            site_type TEXT,
            country TEXT,
            city TEXT,
            address TEXT,
            zip_code TEXT,
            timezone TEXT,
            installation_date TEXT,
            last_update_time INTEGER,
            primary_module_manufacturer TEXT,
            primary_module_model TEXT,
            primary_module_power REAL,
            is_public INTEGER,
            synced_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS equipment (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            serial_number TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT,
            manufacturer TEXT,
            model TEXT,
            communication_method TEXT,
            cpu_version TEXT,
            connected_optimizers INTEGER,
            last_report_date INTEGER,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, serial_number)
        );

        CREATE TABLE IF NOT EXISTS energy_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            reading_date TEXT NOT NULL,
            time_unit TEXT NOT NULL,
            energy_wh REAL NOT NULL,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, reading_date, time_unit)
        );

        CREATE TABLE IF NOT EXISTS power_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            timestamp INTEGER NOT NULL,
            power_watts REAL NOT NULL,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, timestamp)
        );

        CREATE TABLE IF NOT EXISTS power_flows (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            timestamp INTEGER NOT NULL,
            unit TEXT,
            grid_status TEXT,
            grid_power REAL,
            pv_status TEXT,
            pv_power REAL,
            load_status TEXT,
            load_power REAL,
            storage_status TEXT,
            storage_power REAL,
            storage_charge_level REAL,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, timestamp)
        );

        CREATE TABLE IF NOT EXISTS batteries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            serial_number TEXT NOT NULL,
            name TEXT,
            manufacturer TEXT,
            model TEXT,
            nameplate_capacity REAL,
            connected_inverter_sn TEXT,
            last_power REAL,
            last_state TEXT,
            last_state_of_charge REAL,
            lifetime_energy_charged REAL,
            lifetime_energy_discharged REAL,
            capacity REAL,
            last_telemetry_time INTEGER,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, serial_number)
        );

        CREATE TABLE IF NOT EXISTS meters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            model TEXT,
            meter_type TEXT,
            serial_number TEXT,
            connected_to TEXT,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, name)
        );

        CREATE TABLE IF NOT EXISTS meter_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            meter_name TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            energy_wh REAL,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, meter_name, timestamp)
        );

        CREATE TABLE IF NOT EXISTS environmental_benefits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            trees_planted REAL,
            light_bulbs REAL,
            co2_saved REAL,
            so2_saved REAL,
            nox_saved REAL,
            units TEXT,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id)
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            alert_id INTEGER NOT NULL,
            severity TEXT,
            alert_code INTEGER,
            alert_type TEXT,
            component_name TEXT,
            message TEXT,
            serial_number TEXT,
            alert_timestamp INTEGER,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, alert_id)
        );

        CREATE TABLE IF NOT EXISTS inventory_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            serial_number TEXT NOT NULL,
            category TEXT NOT NULL,
            manufacturer TEXT,
            model TEXT,
            firmware_version TEXT,
            cpu_version TEXT,
            connected_optimizers INTEGER,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, name, serial_number)
        );

        CREATE TABLE IF NOT EXISTS inverter_telemetry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            serial_number TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            total_active_power REAL,
            total_energy REAL,
            power_limit REAL,
            temperature REAL,
            inverter_mode TEXT,
            operation_mode INTEGER,
            ac_current REAL,
            ac_voltage REAL,
            ac_frequency REAL,
            active_power REAL,
            apparent_power REAL,
            reactive_power REAL,
            cos_phi REAL,
            dc_voltage REAL,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, serial_number, timestamp)
        );

        CREATE TABLE IF NOT EXISTS optimizer_telemetry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            serial_number TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            panel_id TEXT,
            dc_voltage REAL,
            dc_current REAL,
            dc_power REAL,
            output_voltage REAL,
            output_current REAL,
            output_power REAL,
            energy REAL,
            lifetime_energy REAL,
            temperature REAL,
            optimizer_mode TEXT,
            synced_at INTEGER NOT NULL,
            UNIQUE(site_id, serial_number, timestamp)
        );

        -- Incremental sync position per (site, data type)
        CREATE TABLE IF NOT EXISTS sync_cursors (
            site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
            data_type TEXT NOT NULL,
            last_sync_time INTEGER NOT NULL,
            last_data_timestamp INTEGER,
            records_synced INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            error_message TEXT,
            PRIMARY KEY (site_id, data_type)
        );

        CREATE INDEX IF NOT EXISTS idx_power_site_time ON power_readings(site_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_inverter_telemetry_time ON inverter_telemetry(site_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_optimizer_telemetry_time ON optimizer_telemetry(site_id, timestamp);
        "#,
    )?;

    Ok(())
}
