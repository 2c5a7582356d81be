//! Keys and containers for decoded field data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metrics::{self, MetricId};
use crate::source::SourceFieldId;

/// Identity of one stored grid: which field, valid when, from which run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    pub field_id: SourceFieldId,
    pub valid_time: DateTime<Utc>,
    pub run_time: DateTime<Utc>,
}

impl FieldKey {
    pub fn new(field_id: SourceFieldId, valid_time: DateTime<Utc>, run_time: DateTime<Utc>) -> Self {
        Self {
            field_id,
            valid_time,
            run_time,
        }
    }
}

/// Value arrays grouped by key. A key can carry several arrays (e.g. one
/// per ensemble member); they are accumulated, never overwritten.
pub type FieldBucket = BTreeMap<FieldKey, Vec<Vec<f32>>>;

/// Values of one stored key sampled at a single location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub source_field_id: SourceFieldId,
    pub metric_id: MetricId,
    pub valid_time: DateTime<Utc>,
    pub run_time: DateTime<Utc>,
    /// One value per stored array (missing points are NaN)
    pub values: Vec<f32>,
}

impl DataPoint {
    /// Median of the non-NaN values, `None` if there are none.
    pub fn median(&self) -> Option<f64> {
        let mut vals: Vec<f64> = self
            .values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| *v as f64)
            .collect();
        if vals.is_empty() {
            return None;
        }
        vals.sort_by(|a, b| a.total_cmp(b));
        let mid = vals.len() / 2;
        if vals.len() % 2 == 0 {
            Some((vals[mid - 1] + vals[mid]) / 2.0)
        } else {
            Some(vals[mid])
        }
    }

    /// Median for scalar metrics; circular mean for wind direction, where
    /// 350 and 10 degrees are neighbours.
    pub fn representative(&self) -> Option<f64> {
        if self.metric_id == metrics::WIND_DIRECTION {
            circular_mean(self.values.iter().filter(|v| !v.is_nan()).map(|v| *v as f64))
        } else {
            self.median()
        }
    }
}

/// Mean of angles in degrees, in `[0, 360)`. `None` for no angles.
pub fn circular_mean(degrees: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (mut sin, mut cos, mut n) = (0.0, 0.0, 0usize);
    for d in degrees {
        let r = d.to_radians();
        sin += r.sin();
        cos += r.cos();
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let mean = sin.atan2(cos).to_degrees().rem_euclid(360.0);
    // rem_euclid rounds tiny negative angles up to exactly 360
    Some(if mean >= 360.0 { 0.0 } else { mean })
}
