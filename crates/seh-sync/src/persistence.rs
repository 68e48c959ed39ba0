//! The store as seen by the orchestrator.
//!
//! [`Persistence`] is the narrow interface the orchestrator needs: write a
//! batch, read and write cursors, and look up stored equipment for the
//! telemetry strategies. [`seh_store::Store`] implements it; tests wrap it
//! to inject failures.

use seh_store::{Store, SyncCursor};
use seh_types::{DataType, EquipmentKind, EquipmentRef, RecordBatch, SiteId};

pub type Result<T> = std::result::Result<T, seh_store::Error>;

pub trait Persistence: Send {
    /// Idempotent natural-key upsert of every record in `batch`. Returns
    /// the number of distinct keys written.
    fn upsert(&mut self, batch: &RecordBatch) -> Result<usize>;

    fn get_cursor(&self, site_id: SiteId, data_type: DataType) -> Result<Option<SyncCursor>>;

    fn set_cursor(&mut self, cursor: &SyncCursor) -> Result<()>;

    fn known_equipment(&self, site_id: SiteId, kind: EquipmentKind) -> Result<Vec<EquipmentRef>>;
}

impl Persistence for Store {
    fn upsert(&mut self, batch: &RecordBatch) -> Result<usize> {
        self.upsert_batch(batch)
    }

    fn get_cursor(&self, site_id: SiteId, data_type: DataType) -> Result<Option<SyncCursor>> {
        Store::get_cursor(self, site_id, data_type)
    }

    fn set_cursor(&mut self, cursor: &SyncCursor) -> Result<()> {
        Store::set_cursor(self, cursor)
    }

    fn known_equipment(&self, site_id: SiteId, kind: EquipmentKind) -> Result<Vec<EquipmentRef>> {
        Store::known_equipment(self, site_id, kind)
    }
}
