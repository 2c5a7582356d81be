//! Data sources and the fields configured for each of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::Metric;
use crate::projection::Projection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceFieldId(pub i64);

/// A weather model or observation feed (HRRR, GFS, NAM, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    /// Short identifier used by queue items and derived-field lookup (e.g. "hrrr")
    pub short_name: String,
    /// Human readable name (e.g. "HRRR 2D Surface Data (Sub-Hourly)")
    pub name: String,
    #[serde(default)]
    pub src_url: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Statistical processing applied to a GRIB message's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Instant,
    Avg,
    Accum,
    Max,
    Min,
    Diff,
    Other,
}

impl StepType {
    /// Map a GRIB2 Code Table 4.10 value (type of statistical processing).
    pub fn from_statistical_process(code: u8) -> Self {
        match code {
            0 => StepType::Avg,
            1 => StepType::Accum,
            2 => StepType::Max,
            3 => StepType::Min,
            4 => StepType::Diff,
            _ => StepType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Instant => "instant",
            StepType::Avg => "avg",
            StepType::Accum => "accum",
            StepType::Max => "max",
            StepType::Min => "min",
            StepType::Diff => "diff",
            StepType::Other => "other",
        }
    }
}

impl std::str::FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instant" => Ok(StepType::Instant),
            "avg" => Ok(StepType::Avg),
            "accum" => Ok(StepType::Accum),
            "max" => Ok(StepType::Max),
            "min" => Ok(StepType::Min),
            "diff" => Ok(StepType::Diff),
            "other" => Ok(StepType::Other),
            other => Err(format!("unknown step type: {}", other)),
        }
    }
}

/// Matches one record of a GRIB `.idx` inventory by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSelector {
    /// Inventory short name, e.g. "TMP"
    pub short_name: String,
    /// Inventory level, e.g. "2 m above ground"
    pub level: String,
}

impl IndexSelector {
    pub fn new(short_name: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            level: level.into(),
        }
    }

    pub fn matches(&self, short_name: &str, level: &str) -> bool {
        self.short_name == short_name && self.level == level
    }
}

impl AsRef<IndexSelector> for IndexSelector {
    fn as_ref(&self) -> &IndexSelector {
        self
    }
}

/// Matches decoded GRIB messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GribSelector {
    pub short_name: String,
    pub level: String,
    /// Disambiguates e.g. instantaneous vs. averaged fields of the same name
    #[serde(default)]
    pub step_type: Option<StepType>,
}

impl GribSelector {
    pub fn new(short_name: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            short_name: short_name.into(),
            level: level.into(),
            step_type: None,
        }
    }

    pub fn with_step_type(mut self, step_type: StepType) -> Self {
        self.step_type = Some(step_type);
        self
    }

    pub fn matches(&self, short_name: &str, level: &str, step_type: StepType) -> bool {
        self.short_name == short_name
            && self.level == level
            && self.step_type.map_or(true, |s| s == step_type)
    }

    /// Wind speed/direction fields are produced by derivation and are
    /// usually absent from the GRIB itself.
    pub fn is_tolerated_miss(&self) -> bool {
        self.short_name.eq_ignore_ascii_case("wind") || self.short_name.eq_ignore_ascii_case("wdir")
    }
}

/// A field of a source: how to find it (index + GRIB selectors), what it
/// measures, and the projection its messages were last seen on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceField {
    pub id: SourceFieldId,
    pub source_id: SourceId,
    pub metric: Metric,
    pub idx: IndexSelector,
    pub selector: GribSelector,
    #[serde(default)]
    pub projection: Option<Projection>,
}

impl AsRef<IndexSelector> for SourceField {
    fn as_ref(&self) -> &IndexSelector {
        &self.idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grib_selector_step_type_is_optional() {
        let any = GribSelector::new("APCP", "surface");
        assert!(any.matches("APCP", "surface", StepType::Accum));
        assert!(any.matches("APCP", "surface", StepType::Instant));

        let accum = any.clone().with_step_type(StepType::Accum);
        assert!(accum.matches("APCP", "surface", StepType::Accum));
        assert!(!accum.matches("APCP", "surface", StepType::Avg));
        assert!(!accum.matches("APCP", "2 m above ground", StepType::Accum));
    }

    #[test]
    fn test_tolerated_miss() {
        assert!(GribSelector::new("WIND", "10 m above ground").is_tolerated_miss());
        assert!(GribSelector::new("wdir", "10 m above ground").is_tolerated_miss());
        assert!(!GribSelector::new("UGRD", "10 m above ground").is_tolerated_miss());
    }

    #[test]
    fn test_index_selector_exact_match() {
        let sel = IndexSelector::new("TMP", "2 m above ground");
        assert!(sel.matches("TMP", "2 m above ground"));
        assert!(!sel.matches("TMP", "2 m above ground "));
        assert!(!sel.matches("tmp", "2 m above ground"));
    }

    #[test]
    fn test_statistical_process_codes() {
        assert_eq!(StepType::from_statistical_process(0), StepType::Avg);
        assert_eq!(StepType::from_statistical_process(1), StepType::Accum);
        assert_eq!(StepType::from_statistical_process(200), StepType::Other);
        assert_eq!(StepType::Instant.as_str(), "instant");
    }

    #[test]
    fn test_step_type_parse_matches_as_str() {
        for st in [StepType::Instant, StepType::Accum, StepType::Avg, StepType::Max] {
            assert_eq!(st.as_str().parse::<StepType>().unwrap(), st);
        }
        assert!("hourly".parse::<StepType>().is_err());
    }
}
