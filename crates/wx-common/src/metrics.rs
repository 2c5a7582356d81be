//! Metrics: the physical quantities a source field can provide.

use serde::{Deserialize, Serialize};

/// Stable metric identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(pub i64);

/// A physical quantity, e.g. 2 m temperature.
///
/// Intermediate metrics are inputs to derived-field generation only and
/// are never stored directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: MetricId,
    pub name: String,
    pub units: String,
    #[serde(default)]
    pub intermediate: bool,
}

impl Metric {
    pub fn new(id: MetricId, name: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            units: units.into(),
            intermediate: false,
        }
    }

    pub fn intermediate(mut self) -> Self {
        self.intermediate = true;
        self
    }
}

pub const TEMP: MetricId = MetricId(1);
pub const RAINING: MetricId = MetricId(3);
pub const SNOWING: MetricId = MetricId(6);
pub const WIND_SPEED: MetricId = MetricId(12);
pub const WIND_DIRECTION: MetricId = MetricId(13);
pub const GUST_SPEED: MetricId = MetricId(14);
pub const CLOUD_COVER: MetricId = MetricId(15);
pub const COMPOSITE_REFLECTIVITY: MetricId = MetricId(16);
pub const WIND_U: MetricId = MetricId(17);
pub const WIND_V: MetricId = MetricId(18);

/// The metrics every deployment knows about.
pub fn builtin() -> Vec<Metric> {
    vec![
        Metric::new(TEMP, "2m Temperature", "K"),
        Metric::new(RAINING, "Raining", "bool"),
        Metric::new(SNOWING, "Snowing", "bool"),
        Metric::new(WIND_SPEED, "10m Wind Speed", "m/s"),
        Metric::new(WIND_DIRECTION, "10m Wind Direction", "deg"),
        Metric::new(GUST_SPEED, "Gust Speed", "m/s"),
        Metric::new(CLOUD_COVER, "Cloud Cover", "%"),
        Metric::new(COMPOSITE_REFLECTIVITY, "Composite Reflectivity", "dbZ"),
        Metric::new(WIND_U, "10m Wind U-component", "m/s").intermediate(),
        Metric::new(WIND_V, "10m Wind V-component", "m/s").intermediate(),
    ]
}

/// Metrics used by the daily summary.
pub fn summary_metrics() -> Vec<MetricId> {
    vec![
        TEMP,
        RAINING,
        SNOWING,
        WIND_SPEED,
        WIND_DIRECTION,
        GUST_SPEED,
        CLOUD_COVER,
        COMPOSITE_REFLECTIVITY,
    ]
}
