//! Main store implementation.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

use seh_types::{
    DataType, EnergyReading, EquipmentKind, EquipmentRef, PowerReading, RecordBatch, Site,
    SiteId, SyncStatus, parse_date,
};

use crate::entity::{Entity, site_value, upsert_rows};
use crate::error::{Error, Result};
use crate::models::SyncCursor;
use crate::queries::ReadingQuery;
use crate::schema;

/// SQLite-based store for harvested site data and sync cursors.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// Writes
impl Store {
    /// Insert or refresh `records` by natural key in one transaction.
    ///
    /// Returns the number of distinct keys written. Writing the same
    /// records again leaves the row count unchanged.
    pub fn upsert<E: Entity>(&mut self, records: &[E]) -> Result<usize> {
        let synced_at = OffsetDateTime::now_utc().unix_timestamp();
        let tx = self.conn.transaction()?;
        let written = upsert_rows(&tx, records, synced_at)?;
        tx.commit()?;

        debug!("Upserted {} rows into {}", written, E::TABLE);
        Ok(written)
    }

    /// Write every entity group of `batch` in one transaction.
    ///
    /// Either the whole batch is committed or none of it is.
    pub fn upsert_batch(&mut self, batch: &RecordBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let synced_at = OffsetDateTime::now_utc().unix_timestamp();
        let tx = self.conn.transaction()?;
        let mut written = 0;
        // Sites first so their descriptive fields win over the bare parent
        // rows the child writes create.
        written += upsert_rows(&tx, &batch.sites, synced_at)?;
        written += upsert_rows(&tx, &batch.equipment, synced_at)?;
        written += upsert_rows(&tx, &batch.energy, synced_at)?;
        written += upsert_rows(&tx, &batch.power, synced_at)?;
        written += upsert_rows(&tx, &batch.power_flows, synced_at)?;
        written += upsert_rows(&tx, &batch.batteries, synced_at)?;
        written += upsert_rows(&tx, &batch.meters, synced_at)?;
        written += upsert_rows(&tx, &batch.meter_readings, synced_at)?;
        written += upsert_rows(&tx, &batch.environmental, synced_at)?;
        written += upsert_rows(&tx, &batch.alerts, synced_at)?;
        written += upsert_rows(&tx, &batch.inventory, synced_at)?;
        written += upsert_rows(&tx, &batch.inverter_telemetry, synced_at)?;
        written += upsert_rows(&tx, &batch.optimizer_telemetry, synced_at)?;
        tx.commit()?;

        debug!("Upserted batch of {} rows", written);
        Ok(written)
    }

    /// Remove a site with all of its child rows and cursors.
    ///
    /// Returns `false` if the site was not stored.
    pub fn delete_site(&self, site_id: SiteId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM sites WHERE id = ?", [site_value(site_id)])?;
        if deleted > 0 {
            info!("Deleted site {} and its data", site_id);
        }
        Ok(deleted > 0)
    }
}

// Sync cursor operations
impl Store {
    /// Get the cursor for a `(site, data_type)` pair.
    pub fn get_cursor(&self, site_id: SiteId, data_type: DataType) -> Result<Option<SyncCursor>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT site_id, data_type, last_sync_time, last_data_timestamp, records_synced,
                    status, error_message
             FROM sync_cursors WHERE site_id = ?1 AND data_type = ?2",
        )?;

        let cursor = stmt
            .query_row(
                rusqlite::params![site_value(site_id), data_type.as_str()],
                cursor_from_row,
            )
            .optional()?;

        Ok(cursor)
    }

    /// Insert or replace the cursor for `(cursor.site_id, cursor.data_type)`.
    ///
    /// The cursor is stored as given; keeping the high-water mark monotonic
    /// is the caller's job.
    pub fn set_cursor(&self, cursor: &SyncCursor) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sites (id, synced_at) VALUES (?1, ?2)",
            rusqlite::params![
                site_value(cursor.site_id),
                cursor.last_sync_time.unix_timestamp()
            ],
        )?;

        self.conn.execute(
            "INSERT INTO sync_cursors (site_id, data_type, last_sync_time, last_data_timestamp,
                                       records_synced, status, error_message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(site_id, data_type) DO UPDATE SET
                last_sync_time = excluded.last_sync_time,
                last_data_timestamp = excluded.last_data_timestamp,
                records_synced = excluded.records_synced,
                status = excluded.status,
                error_message = excluded.error_message",
            rusqlite::params![
                site_value(cursor.site_id),
                cursor.data_type.as_str(),
                cursor.last_sync_time.unix_timestamp(),
                cursor.last_data_timestamp.map(|ts| ts.unix_timestamp()),
                cursor.records_synced as i64,
                cursor.status.as_str(),
                cursor.error_message,
            ],
        )?;

        debug!(
            "Updated cursor for site {} {}: status={}, records={}",
            cursor.site_id, cursor.data_type, cursor.status, cursor.records_synced
        );

        Ok(())
    }

    /// List cursors, optionally for one site, ordered by site and then by
    /// strategy execution order.
    pub fn list_cursors(&self, site_id: Option<SiteId>) -> Result<Vec<SyncCursor>> {
        let sql = "SELECT site_id, data_type, last_sync_time, last_data_timestamp,
                          records_synced, status, error_message
                   FROM sync_cursors";
        let mut cursors = match site_id {
            Some(site_id) => {
                let mut stmt = self.conn.prepare(&format!("{sql} WHERE site_id = ?"))?;
                let rows = stmt
                    .query_map([site_value(site_id)], cursor_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(sql)?;
                let rows = stmt
                    .query_map([], cursor_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        cursors.sort_by_key(|c| (c.site_id, c.data_type));
        Ok(cursors)
    }
}

// Reads
impl Store {
    pub fn get_site(&self, site_id: SiteId) -> Result<Option<Site>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?"))?;
        let site = stmt
            .query_row([site_value(site_id)], site_from_row)
            .optional()?;
        Ok(site)
    }

    pub fn list_sites(&self) -> Result<Vec<Site>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY id"))?;
        let sites = stmt
            .query_map([], site_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sites)
    }

    /// Serial numbers of stored equipment of one kind, in serial order.
    pub fn known_equipment(&self, site_id: SiteId, kind: EquipmentKind) -> Result<Vec<EquipmentRef>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT serial_number FROM equipment
             WHERE site_id = ?1 AND kind = ?2 AND serial_number != ''
             ORDER BY serial_number",
        )?;
        let equipment = stmt
            .query_map(
                rusqlite::params![site_value(site_id), kind.as_str()],
                |row| Ok(EquipmentRef::new(row.get::<_, String>(0)?, kind)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(equipment)
    }

    /// Query power readings with filters.
    pub fn query_power(&self, query: &ReadingQuery) -> Result<Vec<PowerReading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(PowerReading {
                    site_id: row.get::<_, i64>(0)? as SiteId,
                    timestamp: timestamp_at(row, 1)?,
                    power_watts: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Energy readings of a site in date order.
    pub fn energy_readings(&self, site_id: SiteId) -> Result<Vec<EnergyReading>> {
        let mut stmt = self.conn.prepare(
            "SELECT site_id, reading_date, time_unit, energy_wh FROM energy_readings
             WHERE site_id = ? ORDER BY reading_date, time_unit",
        )?;
        let readings = stmt
            .query_map([site_value(site_id)], |row| {
                Ok(EnergyReading {
                    site_id: row.get::<_, i64>(0)? as SiteId,
                    reading_date: date_at(row, 1)?,
                    time_unit: row.get(2)?,
                    energy_wh: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// Number of stored rows of an entity, optionally for one site.
    pub fn count<E: Entity>(&self, site_id: Option<SiteId>) -> Result<u64> {
        let count: i64 = match site_id {
            Some(site_id) => self.conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {} WHERE {} = ?",
                    E::TABLE,
                    E::KEY_COLUMNS[0]
                ),
                [site_value(site_id)],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", E::TABLE),
                [],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }
}

const SITE_COLUMNS: &str = "id, name, account_id, status, peak_power, currency, site_type, \
     country, city, address, zip_code, timezone, installation_date, last_update_time, \
     primary_module_manufacturer, primary_module_model, primary_module_power, is_public";

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get::<_, i64>(0)? as SiteId,
        name: row.get(1)?,
        account_id: row.get(2)?,
        status: row.get(3)?,
        peak_power: row.get(4)?,
        currency: row.get(5)?,
        site_type: row.get(6)?,
        country: row.get(7)?,
        city: row.get(8)?,
        address: row.get(9)?,
        zip_code: row.get(10)?,
        timezone: row.get(11)?,
        installation_date: match row.get::<_, Option<String>>(12)? {
            Some(_) => Some(date_at(row, 12)?),
            None => None,
        },
        last_update_time: optional_timestamp_at(row, 13)?,
        primary_module_manufacturer: row.get(14)?,
        primary_module_model: row.get(15)?,
        primary_module_power: row.get(16)?,
        is_public: row.get::<_, Option<i64>>(17)?.map(|v| v != 0),
    })
}

fn cursor_from_row(row: &Row<'_>) -> rusqlite::Result<SyncCursor> {
    let data_type: String = row.get(1)?;
    let status: String = row.get(5)?;
    Ok(SyncCursor {
        site_id: row.get::<_, i64>(0)? as SiteId,
        data_type: data_type
            .parse::<DataType>()
            .map_err(|e| conversion_error(1, Type::Text, e))?,
        last_sync_time: timestamp_at(row, 2)?,
        last_data_timestamp: optional_timestamp_at(row, 3)?,
        records_synced: row.get::<_, i64>(4)?.max(0) as u64,
        status: status
            .parse::<SyncStatus>()
            .map_err(|e| conversion_error(5, Type::Text, e))?,
        error_message: row.get(6)?,
    })
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let secs: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(secs).map_err(|e| conversion_error(idx, Type::Integer, e))
}

fn optional_timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Date> {
    let text: String = row.get(idx)?;
    parse_date(&text).map_err(|e| conversion_error(idx, Type::Text, e))
}
