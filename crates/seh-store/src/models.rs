//! Rows read back from the store.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use seh_types::{DataType, SiteId, SyncStatus};

/// Incremental sync position for one `(site, data_type)` pair.
///
/// `last_data_timestamp` is the newest vendor data timestamp observed so far
/// and only ever moves forward on successful runs. `last_sync_time` records
/// when the strategy last completed, whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub site_id: SiteId,
    pub data_type: DataType,
    #[serde(with = "time::serde::rfc3339")]
    pub last_sync_time: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_data_timestamp: Option<OffsetDateTime>,
    pub records_synced: u64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
}

impl SyncCursor {
    /// A cursor for a successful run.
    pub fn success(
        site_id: SiteId,
        data_type: DataType,
        last_sync_time: OffsetDateTime,
        last_data_timestamp: Option<OffsetDateTime>,
        records_synced: u64,
    ) -> Self {
        Self {
            site_id,
            data_type,
            last_sync_time,
            last_data_timestamp,
            records_synced,
            status: SyncStatus::Success,
            error_message: None,
        }
    }

    /// Downgrade to [`SyncStatus::Partial`] with an explanatory message.
    #[must_use]
    pub fn partial(mut self, message: impl Into<String>) -> Self {
        self.status = SyncStatus::Partial;
        self.error_message = Some(message.into());
        self
    }

    /// A cursor for a failed run. The previous high-water mark is kept.
    pub fn error(
        site_id: SiteId,
        data_type: DataType,
        last_sync_time: OffsetDateTime,
        previous: Option<&SyncCursor>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            site_id,
            data_type,
            last_sync_time,
            last_data_timestamp: previous.and_then(|c| c.last_data_timestamp),
            records_synced: 0,
            status: SyncStatus::Error,
            error_message: Some(message.into()),
        }
    }
}
