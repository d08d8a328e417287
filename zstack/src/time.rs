//! Julian date helpers.
//!
//! Observation times are stored as Julian dates (UTC). Filenames and header
//! date cards need calendar forms of them.

use chrono::{DateTime, Utc};

/// Julian date of 1970-01-01T00:00:00 UTC.
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub fn jd_to_datetime(jd: f64) -> Option<DateTime<Utc>> {
    if !jd.is_finite() {
        return None;
    }
    let millis = ((jd - UNIX_EPOCH_JD) * MILLIS_PER_DAY).round();
    DateTime::from_timestamp_millis(millis as i64)
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2018-07-12T03:14:15.926`.
pub fn jd_to_iso(jd: f64) -> Option<String> {
    jd_to_datetime(jd).map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
}

/// Compact UTC calendar date, e.g. `20180712`.
pub fn jd_to_date_token(jd: f64) -> Option<String> {
    jd_to_datetime(jd).map(|t| t.format("%Y%m%d").to_string())
}
