//! Time handling utilities for meteorological data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Unit of a forecast time or statistical time range (GRIB2 Code Table 4.4).
///
/// Only the units that can be converted to a fixed duration are named;
/// everything else (months, years, multi-hour codes) is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Other(u8),
}

impl TimeUnit {
    /// Map a GRIB2 Code Table 4.4 value.
    pub fn from_grib_code(code: u8) -> Self {
        match code {
            0 => TimeUnit::Minutes,
            1 => TimeUnit::Hours,
            2 => TimeUnit::Days,
            13 => TimeUnit::Seconds,
            other => TimeUnit::Other(other),
        }
    }

    /// Short name as printed by GRIB tooling (`secs`, `mins`, `hrs`, `days`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "secs",
            TimeUnit::Minutes => "mins",
            TimeUnit::Hours => "hrs",
            TimeUnit::Days => "days",
            TimeUnit::Other(_) => "unknown",
        }
    }

    pub fn is_fixed(&self) -> bool {
        !matches!(self, TimeUnit::Other(_))
    }

    /// Duration of `length` units, or `None` for units with no fixed length
    /// and lengths too large to represent.
    pub fn duration(&self, length: i64) -> Option<Duration> {
        match self {
            TimeUnit::Seconds => Duration::try_seconds(length),
            TimeUnit::Minutes => Duration::try_minutes(length),
            TimeUnit::Hours => Duration::try_hours(length),
            TimeUnit::Days => Duration::try_days(length),
            TimeUnit::Other(_) => None,
        }
    }

    /// `time` advanced by `length` units. `None` when the unit has no fixed
    /// length or the result is out of range.
    pub fn advance(&self, time: DateTime<Utc>, length: i64) -> Option<DateTime<Utc>> {
        self.duration(length)
            .and_then(|offset| time.checked_add_signed(offset))
    }
}

/// Seconds since the Unix epoch.
pub fn to_unix(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Inverse of [`to_unix`]; out-of-range values clamp to the epoch.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
