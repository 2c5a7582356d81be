//! Catalog seed files.
//!
//! A seed describes sources and the fields to ingest for each of them:
//!
//! ```yaml
//! sources:
//!   - short_name: hrrr
//!     name: HRRR 2D Surface Data (Sub-Hourly)
//!     src_url: https://nomads.ncep.noaa.gov/pub/data/nccf/com/hrrr/prod/
//!     fields:
//!       - metric: 1
//!         idx: { short_name: TMP, level: 2 m above ground }
//!         grib: { short_name: TMP, level: 2 m above ground }
//! ```

use serde::{Deserialize, Serialize};

use wx_common::{metrics, GribSelector, IndexSelector, Metric, MetricId, WxError, WxResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    /// Metrics in addition to the built-in ones; same id replaces a built-in
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub sources: Vec<SourceSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSeed {
    pub short_name: String,
    pub name: String,
    #[serde(default)]
    pub src_url: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSeed {
    pub metric: MetricId,
    pub idx: IndexSelector,
    pub grib: GribSelector,
}

impl CatalogSeed {
    pub fn from_yaml_str(yaml: &str) -> WxResult<Self> {
        let seed: CatalogSeed = serde_yaml::from_str(yaml)
            .map_err(|e| WxError::ConfigError(format!("Invalid catalog seed: {}", e)))?;
        seed.validate()?;
        Ok(seed)
    }

    /// Concatenate several seeds, e.g. one file per source.
    pub fn merge(seeds: impl IntoIterator<Item = CatalogSeed>) -> Self {
        let mut merged = CatalogSeed::default();
        for seed in seeds {
            merged.metrics.extend(seed.metrics);
            merged.sources.extend(seed.sources);
        }
        merged
    }

    /// Built-in metrics overlaid with the seed's own.
    pub fn all_metrics(&self) -> Vec<Metric> {
        let mut all = metrics::builtin();
        for metric in &self.metrics {
            match all.iter_mut().find(|m| m.id == metric.id) {
                Some(existing) => *existing = metric.clone(),
                None => all.push(metric.clone()),
            }
        }
        all
    }

    /// Every field must reference a known metric and every source may
    /// configure a metric once.
    pub fn validate(&self) -> WxResult<()> {
        let metrics = self.all_metrics();
        for source in &self.sources {
            let mut seen = Vec::new();
            for field in &source.fields {
                if !metrics.iter().any(|m| m.id == field.metric) {
                    return Err(WxError::ConfigError(format!(
                        "Source {} references unknown metric {}",
                        source.short_name, field.metric.0
                    )));
                }
                if seen.contains(&field.metric) {
                    return Err(WxError::ConfigError(format!(
                        "Source {} configures metric {} twice",
                        source.short_name, field.metric.0
                    )));
                }
                seen.push(field.metric);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wx_common::StepType;

    const HRRR: &str = r#"
sources:
  - short_name: hrrr
    name: HRRR 2D Surface Data (Sub-Hourly)
    fields:
      - metric: 1
        idx: { short_name: TMP, level: 2 m above ground }
        grib: { short_name: TMP, level: 2 m above ground }
      - metric: 3
        idx: { short_name: CRAIN, level: surface }
        grib: { short_name: CRAIN, level: surface, step_type: instant }
"#;

    #[test]
    fn test_parse_seed() {
        let seed = CatalogSeed::from_yaml_str(HRRR).unwrap();
        assert_eq!(seed.sources.len(), 1);
        let fields = &seed.sources[0].fields;
        assert_eq!(fields[0].metric, MetricId(1));
        assert_eq!(fields[0].idx.level, "2 m above ground");
        assert_eq!(fields[0].grib.step_type, None);
        assert_eq!(fields[1].grib.step_type, Some(StepType::Instant));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let yaml = HRRR.replace("metric: 3", "metric: 99");
        assert!(matches!(
            CatalogSeed::from_yaml_str(&yaml),
            Err(WxError::ConfigError(_))
        ));
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let yaml = HRRR.replace("metric: 3", "metric: 1");
        assert!(CatalogSeed::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn test_seed_metric_overrides_builtin() {
        let seed = CatalogSeed {
            metrics: vec![Metric::new(metrics::TEMP, "Temperature", "C")],
            sources: vec![],
        };
        let all = seed.all_metrics();
        assert_eq!(all.len(), metrics::builtin().len());
        assert_eq!(all[0].units, "C");
    }
}
