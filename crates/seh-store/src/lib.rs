//! SQLite persistence for the SolarEdge harvest sync engine.
//!
//! This crate stores harvested site data under natural-key uniqueness and
//! keeps the per-`(site, data_type)` sync cursors that drive incremental
//! fetch windows.
//!
//! # Features
//!
//! - One generic, idempotent upsert path for every entity ([`Entity`])
//! - Whole-batch transactions for strategy output ([`Store::upsert_batch`])
//! - Sync cursors with status and error message
//! - Site cascade delete
//!
//! # Example
//!
//! ```
//! use seh_store::{Store, SyncCursor};
//! use seh_types::{DataType, PowerReading};
//! use time::macros::datetime;
//!
//! let mut store = Store::open_in_memory()?;
//! let reading = PowerReading {
//!     site_id: 42,
//!     timestamp: datetime!(2024-06-01 12:00 UTC),
//!     power_watts: 3150.0,
//! };
//!
//! // Writing the same reading twice leaves one row.
//! store.upsert(&[reading.clone()])?;
//! store.upsert(&[reading.clone()])?;
//! assert_eq!(store.count::<PowerReading>(Some(42))?, 1);
//!
//! store.set_cursor(&SyncCursor::success(
//!     42,
//!     DataType::Power,
//!     datetime!(2024-06-01 12:05 UTC),
//!     Some(reading.timestamp),
//!     1,
//! ))?;
//! assert!(store.get_cursor(42, DataType::Power)?.is_some());
//! # Ok::<(), seh_store::Error>(())
//! ```

mod entity;
mod error;
mod models;
mod queries;
mod schema;
mod store;

pub use entity::Entity;
pub use error::{Error, Result};
pub use models::SyncCursor;
pub use queries::ReadingQuery;
pub use schema::SCHEMA_VERSION;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/seh/seh.db`
/// - macOS: `~/Library/Application Support/seh/seh.db`
/// - Windows: `C:\Users\<user>\AppData\Local\seh\seh.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("seh")
        .join("seh.db")
}
