//! Conversions between chat database timestamps and UTC.
//!
//! The Messages app stores times relative to 2001-01-01T00:00:00Z. Databases
//! written since macOS 10.13 use nanoseconds; older ones use seconds. Zero
//! means "not set".

use chrono::{DateTime, TimeZone, Utc};

/// Seconds between the Unix epoch and 2001-01-01T00:00:00Z.
pub const APPLE_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// Raw values above this are nanoseconds; below, seconds.
const NANOSECOND_THRESHOLD: i64 = 100_000_000_000;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// `None` for zero or a value outside chrono's range.
pub fn from_apple(raw: i64) -> Option<DateTime<Utc>> {
    if raw == 0 {
        return None;
    }
    let (secs, nanos) = if raw.abs() > NANOSECOND_THRESHOLD {
        (raw.div_euclid(NANOS_PER_SEC), raw.rem_euclid(NANOS_PER_SEC))
    } else {
        (raw, 0)
    };
    let unix = secs.checked_add(APPLE_EPOCH_OFFSET_SECS)?;
    Utc.timestamp_opt(unix, nanos as u32).single()
}

/// Nanoseconds since the Apple epoch, saturating at the `i64` range.
pub fn to_apple_nanos(at: DateTime<Utc>) -> i64 {
    let secs = at.timestamp() - APPLE_EPOCH_OFFSET_SECS;
    secs.saturating_mul(NANOS_PER_SEC)
        .saturating_add(i64::from(at.timestamp_subsec_nanos()))
}
