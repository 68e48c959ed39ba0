//! Fetch-window computation.
//!
//! Without a cursor (or on a `full` run) a strategy fetches its lookback
//! `[now - lookback, now]`. With a cursor it fetches
//! `[last_data_timestamp - overlap, now]`; the overlap is applied on every
//! incremental run, so interrupted runs, clock skew and late vendor reports
//! are re-fetched and absorbed by the idempotent upsert.

use time::{Date, Duration, OffsetDateTime};

use seh_store::SyncCursor;

/// Time range handed to a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl FetchWindow {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn start_date(&self) -> Date {
        self.start.date()
    }

    pub fn end_date(&self) -> Date {
        self.end.date()
    }

    /// Split into contiguous pieces no longer than `max_span`.
    ///
    /// The pieces cover the window exactly; an empty window yields none.
    pub fn chunks(&self, max_span: Duration) -> Vec<FetchWindow> {
        let mut chunks = Vec::new();
        if max_span <= Duration::ZERO {
            if self.start < self.end {
                chunks.push(*self);
            }
            return chunks;
        }

        let mut start = self.start;
        while start < self.end {
            let end = (start + max_span).min(self.end);
            chunks.push(FetchWindow::new(start, end));
            start = end;
        }
        chunks
    }
}

/// Window for the next fetch of one `(site, data_type)`.
///
/// A high-water mark ahead of `now` (clock skew) is clamped so the window
/// still ends at `now` and covers at least the overlap.
pub fn compute_window(
    cursor: Option<&SyncCursor>,
    lookback: Duration,
    overlap: Duration,
    now: OffsetDateTime,
    full: bool,
) -> FetchWindow {
    let high_water = if full {
        None
    } else {
        cursor.and_then(|c| c.last_data_timestamp)
    };

    let start = match high_water {
        Some(ts) => (ts - overlap).min(now - overlap),
        None => now - lookback,
    };

    FetchWindow::new(start, now)
}

/// New high-water mark after a successful run: never behind `previous`.
pub fn advance_high_water(
    previous: Option<OffsetDateTime>,
    observed: Option<OffsetDateTime>,
) -> Option<OffsetDateTime> {
    match (previous, observed) {
        (Some(p), Some(o)) => Some(p.max(o)),
        (p, o) => p.or(o),
    }
}
