//! Fields computed from other fields of the same GRIB file.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use grib2_parser::{Grib2Error, Grib2Message, GribSource};
use storage::ProjectionRegistry;
use wx_common::{
    metrics, FieldBucket, FieldKey, MetricId, Projection, ProjectionId, Source, SourceField,
};

use crate::error::Result;
use crate::grib::end_valid_time;

/// Derived arrays grouped by the projection they are on.
pub type DerivedFields = Vec<(Projection, FieldBucket)>;

/// What a generator may look at besides the GRIB file.
pub struct DerivedContext<'a> {
    pub source: &'a Source,
    /// Every field of the source, intermediate ones included
    pub fields: &'a [SourceField],
    pub projections: &'a dyn ProjectionRegistry,
}

impl DerivedContext<'_> {
    pub fn field_for(&self, metric: MetricId) -> Option<&SourceField> {
        self.fields.iter().find(|f| f.metric.id == metric)
    }
}

#[async_trait]
pub trait DerivedFieldGenerator: Send + Sync {
    async fn generate_derived(
        &self,
        grib: &mut dyn GribSource,
        ctx: &DerivedContext<'_>,
    ) -> Result<DerivedFields>;
}

/// Generators by source short name.
#[derive(Clone, Default)]
pub struct DerivedRegistry {
    generators: HashMap<String, Arc<dyn DerivedFieldGenerator>>,
}

impl DerivedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wind derivation for the NCEP models.
    pub fn builtin() -> Self {
        let wind: Arc<dyn DerivedFieldGenerator> = Arc::new(WindDerivation);
        let mut registry = Self::new();
        for source in ["hrrr", "gfs", "nam"] {
            registry = registry.with(source, wind.clone());
        }
        registry
    }

    pub fn with(mut self, source: &str, generator: Arc<dyn DerivedFieldGenerator>) -> Self {
        self.generators.insert(source.to_string(), generator);
        self
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn DerivedFieldGenerator>> {
        self.generators.get(source).cloned()
    }
}

/// Wind speed and direction from the 10 m U/V components.
pub struct WindDerivation;

impl WindDerivation {
    fn select_or_empty(
        grib: &mut dyn GribSource,
        field: &SourceField,
    ) -> Result<Vec<Grib2Message>> {
        match grib.select(&field.selector) {
            Ok(messages) => Ok(messages),
            Err(Grib2Error::NoMatch(what)) => {
                debug!(selector = %what, "Wind component missing, nothing to derive");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DerivedFieldGenerator for WindDerivation {
    async fn generate_derived(
        &self,
        grib: &mut dyn GribSource,
        ctx: &DerivedContext<'_>,
    ) -> Result<DerivedFields> {
        let (Some(u_field), Some(v_field)) = (
            ctx.field_for(metrics::WIND_U),
            ctx.field_for(metrics::WIND_V),
        ) else {
            return Ok(Vec::new());
        };
        let speed_field = ctx.field_for(metrics::WIND_SPEED);
        let dir_field = ctx.field_for(metrics::WIND_DIRECTION);
        if speed_field.is_none() && dir_field.is_none() {
            return Ok(Vec::new());
        }

        let u_messages = Self::select_or_empty(grib, u_field)?;
        let v_messages = Self::select_or_empty(grib, v_field)?;

        let mut out: BTreeMap<ProjectionId, (Projection, FieldBucket)> = BTreeMap::new();

        let mut v_times = Vec::with_capacity(v_messages.len());
        for v in &v_messages {
            v_times.push((end_valid_time(v)?, v.anal_date()));
        }

        for u in &u_messages {
            let valid = end_valid_time(u)?;
            let run = u.anal_date();
            let Some(v) = v_messages
                .iter()
                .zip(&v_times)
                .find(|(_, times)| **times == (valid, run))
                .map(|(v, _)| v)
            else {
                warn!(valid = %valid, "No V component for U component, skipping");
                continue;
            };

            let params = u.projection_params()?;
            if v.projection_params()? != params {
                warn!(valid = %valid, "U and V components on different grids, skipping");
                continue;
            }
            let projection = ctx.projections.get_or_create_projection(&params).await?;

            let (speed, direction) = wind_speed_direction(&u.values()?, &v.values()?);

            let (_, bucket) = out
                .entry(projection.id)
                .or_insert_with(|| (projection.clone(), FieldBucket::new()));
            if let Some(field) = speed_field {
                bucket
                    .entry(FieldKey::new(field.id, valid, run))
                    .or_default()
                    .push(speed);
            }
            if let Some(field) = dir_field {
                bucket
                    .entry(FieldKey::new(field.id, valid, run))
                    .or_default()
                    .push(direction);
            }
        }

        debug!(source = %ctx.source.short_name, projections = out.len(), "Derived wind fields");
        Ok(out.into_values().collect())
    }
}

/// Speed (`hypot(u, v)`) and meteorological direction (degrees the wind
/// blows from, clockwise from north).
pub fn wind_speed_direction(u: &[f32], v: &[f32]) -> (Vec<f32>, Vec<f32>) {
    u.iter()
        .zip(v)
        .map(|(&u, &v)| {
            let speed = u.hypot(v);
            let direction = (270.0 - v.atan2(u).to_degrees()).rem_euclid(360.0);
            (speed, direction)
        })
        .unzip()
}
