//! Parsing and formatting of vendor timestamps.
//!
//! The monitoring API reports wall-clock times without an offset
//! (`2024-03-01 12:15:00`), dates as `2024-03-01`, and a few fields as
//! RFC 3339. Offset-less values are interpreted as UTC; the overlap buffer
//! applied to incremental windows absorbs the difference to the site's
//! local clock.

use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::error::{ParseError, ParseResult};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const ISO_LOCAL_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Parse a vendor timestamp in any of the accepted formats.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339 and a bare
/// `YYYY-MM-DD` (midnight UTC).
///
/// # Examples
///
/// ```
/// use seh_types::parse_timestamp;
/// use time::macros::datetime;
///
/// assert_eq!(
///     parse_timestamp("2024-03-01 12:15:00").unwrap(),
///     datetime!(2024-03-01 12:15:00 UTC)
/// );
/// assert_eq!(
///     parse_timestamp("2024-03-01T12:15:00+02:00").unwrap(),
///     datetime!(2024-03-01 10:15:00 UTC)
/// );
/// ```
pub fn parse_timestamp(value: &str) -> ParseResult<OffsetDateTime> {
    let value = value.trim();
    if let Ok(dt) = PrimitiveDateTime::parse(value, DATETIME_FORMAT) {
        return Ok(dt.assume_utc());
    }
    if let Ok(dt) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(dt.to_offset(time::UtcOffset::UTC));
    }
    if let Ok(dt) = PrimitiveDateTime::parse(value, ISO_LOCAL_FORMAT) {
        return Ok(dt.assume_utc());
    }
    if let Ok(date) = Date::parse(value, DATE_FORMAT) {
        return Ok(start_of_day(date));
    }
    Err(ParseError::InvalidTimestamp(value.to_string()))
}

/// Parse the date portion of a vendor value.
///
/// Energy values carry `2024-03-01 00:00:00`; only the first ten characters
/// are significant.
pub fn parse_date(value: &str) -> ParseResult<Date> {
    let trimmed = value.trim();
    let head = trimmed.get(..10).unwrap_or(trimmed);
    Date::parse(head, DATE_FORMAT).map_err(|_| ParseError::InvalidTimestamp(value.to_string()))
}

/// Midnight UTC of `date`.
#[must_use]
pub fn start_of_day(date: Date) -> OffsetDateTime {
    PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc()
}

/// Format a date for date-range query parameters (`startDate`/`endDate`).
#[must_use]
pub fn format_api_date(date: Date) -> String {
    // Formatting with a static description only fails for out-of-range years.
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

/// Format a timestamp for time-range query parameters (`startTime`/`endTime`).
#[must_use]
pub fn format_api_datetime(ts: OffsetDateTime) -> String {
    let utc = ts.to_offset(time::UtcOffset::UTC);
    let naive = PrimitiveDateTime::new(utc.date(), utc.time());
    naive
        .format(DATETIME_FORMAT)
        .unwrap_or_else(|_| naive.to_string())
}

/// Truncate a capture time to the start of its quarter-hour slot.
///
/// Power-flow snapshots have no vendor timestamp; keying them by slot makes
/// repeated runs within the same fifteen minutes refresh one row.
#[must_use]
pub fn quarter_hour_slot(ts: OffsetDateTime) -> OffsetDateTime {
    let seconds = ts.unix_timestamp();
    let slot = seconds - seconds.rem_euclid(15 * 60);
    OffsetDateTime::from_unix_timestamp(slot).unwrap_or(ts)
}
