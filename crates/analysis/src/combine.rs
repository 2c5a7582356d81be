//! Merging data points from competing models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use wx_common::{circular_mean, metrics, DataPoint, MetricId, SourceFieldId};

/// One representative value per metric and valid time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedDataPoint {
    pub metric_id: MetricId,
    pub valid_time: DateTime<Utc>,
    pub value: f64,
    /// Fields whose values went into `value`, ascending
    pub source_field_ids: Vec<SourceFieldId>,
}

/// Combine points sharing a metric and valid time.
///
/// Only the most recent run of each source field counts (the first one
/// seen wins a tie). The combined value is the mean of those runs'
/// medians; wind direction uses circular means throughout. Groups with no
/// finite values are dropped. Output is ordered by metric id, then valid
/// time.
pub fn combine_models(points: &[DataPoint]) -> Vec<CombinedDataPoint> {
    let mut groups: BTreeMap<(MetricId, DateTime<Utc>), BTreeMap<SourceFieldId, &DataPoint>> =
        BTreeMap::new();

    for point in points {
        let latest = groups
            .entry((point.metric_id, point.valid_time))
            .or_default()
            .entry(point.source_field_id)
            .or_insert(point);
        if point.run_time > latest.run_time {
            *latest = point;
        }
    }

    groups
        .into_iter()
        .filter_map(|((metric_id, valid_time), latest)| {
            let medians: Vec<(SourceFieldId, f64)> = latest
                .into_iter()
                .filter_map(|(field, point)| point.representative().map(|m| (field, m)))
                .collect();
            if medians.is_empty() {
                debug!(metric = metric_id.0, valid = %valid_time, "No values to combine");
                return None;
            }

            let values = medians.iter().map(|(_, m)| *m);
            let value = if metric_id == metrics::WIND_DIRECTION {
                circular_mean(values)?
            } else {
                values.sum::<f64>() / medians.len() as f64
            };
            Some(CombinedDataPoint {
                metric_id,
                valid_time,
                value,
                source_field_ids: medians.into_iter().map(|(field, _)| field).collect(),
            })
        })
        .collect()
}
