//! Query builder for stored power readings.
//!
//! # Example
//!
//! ```
//! use seh_store::{ReadingQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let yesterday = OffsetDateTime::now_utc() - Duration::hours(24);
//!
//! let query = ReadingQuery::new()
//!     .site(42)
//!     .since(yesterday)
//!     .limit(96);
//!
//! let readings = store.query_power(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), seh_store::Error>(())
//! ```

use time::OffsetDateTime;

use seh_types::SiteId;

/// Fluent query builder for [`Store::query_power`](crate::Store::query_power).
///
/// By default, queries return every site's readings, newest first.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by site.
    pub site_id: Option<SiteId>,
    /// Readings at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Readings at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending.
    pub newest_first: bool,
}

impl ReadingQuery {
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    pub fn site(mut self, site_id: SiteId) -> Self {
        self.site_id = Some(site_id);
        self
    }

    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results. Use with `limit()` for pagination.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Chronological order, oldest first.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    pub(crate) fn build_where(&self) -> (String, Vec<i64>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(site_id) = self.site_id {
            conditions.push("site_id = ?");
            params.push(site_id as i64);
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(since.unix_timestamp());
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(until.unix_timestamp());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT site_id, timestamp, power_watts FROM power_readings {} \
             ORDER BY timestamp {}",
            where_clause, order
        );

        // SQLite only accepts OFFSET after a LIMIT.
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_default_query() {
        let query = ReadingQuery::new();
        assert!(query.newest_first);
        assert_eq!(
            query.build_sql(),
            "SELECT site_id, timestamp, power_watts FROM power_readings  ORDER BY timestamp DESC"
        );
    }

    #[test]
    fn test_filters_and_pagination() {
        let since = datetime!(2024-06-01 00:00 UTC);
        let query = ReadingQuery::new()
            .site(7)
            .since(since)
            .limit(10)
            .offset(20)
            .oldest_first();

        let (where_clause, params) = query.build_where();
        assert_eq!(where_clause, "WHERE site_id = ? AND timestamp >= ?");
        assert_eq!(params, vec![7, since.unix_timestamp()]);
        assert!(query.build_sql().ends_with("ORDER BY timestamp ASC LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_offset_without_limit() {
        let sql = ReadingQuery::new().offset(5).build_sql();
        assert!(sql.ends_with("LIMIT -1 OFFSET 5"));
    }
}
