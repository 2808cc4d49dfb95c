//! Timestamp utilities

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's date in UTC
pub fn today() -> NaiveDate {
    now().date_naive()
}

/// Format a timestamp as ISO-8601 with millisecond precision and `Z` suffix
///
/// Matches the shape browsers produce with `Date.prototype.toISOString`,
/// e.g. `2024-03-05T14:07:09.123Z`.
pub fn to_iso_millis(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
