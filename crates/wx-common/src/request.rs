//! Ingestion requests carried by the work queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::from_unix;

/// One GRIB file to reduce and ingest.
///
/// Times are Unix seconds to keep the queue payload stable across
/// producers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngestRequest {
    pub url: String,
    pub idx_url: String,
    /// Source short name
    pub source: String,
    pub valid_time: i64,
    pub run_time: i64,
}

impl IngestRequest {
    pub fn valid_at(&self) -> DateTime<Utc> {
        from_unix(self.valid_time)
    }

    pub fn run_at(&self) -> DateTime<Utc> {
        from_unix(self.run_time)
    }

    /// Whether the request's valid time is older than `max_age` before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        self.valid_at() < now - max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(valid: DateTime<Utc>) -> IngestRequest {
        IngestRequest {
            url: "https://example.com/hrrr.t12z.wrfsfcf01.grib2".into(),
            idx_url: "https://example.com/hrrr.t12z.wrfsfcf01.grib2.idx".into(),
            source: "hrrr".into(),
            valid_time: valid.timestamp(),
            run_time: valid.timestamp() - 3600,
        }
    }

    #[test]
    fn test_request_json_shape() {
        let valid = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let json = serde_json::to_value(request(valid)).unwrap();
        assert_eq!(json["source"], "hrrr");
        assert_eq!(json["valid_time"], valid.timestamp());
    }

    #[test]
    fn test_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 16, 12, 0, 0).unwrap();
        let max_age = Duration::hours(12);
        assert!(request(now - Duration::hours(13)).is_expired(now, max_age));
        assert!(!request(now - Duration::hours(11)).is_expired(now, max_age));
        assert!(!request(now + Duration::hours(6)).is_expired(now, max_age));
    }
}
