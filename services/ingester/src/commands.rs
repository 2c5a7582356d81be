//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use analysis::{combine_models, daily_windows, SummarizedData};
use ingestion::{
    import_local, reduce, GribIngestor, HttpFetcher, IngestStats, ReduceStats, Worker, WorkerStats,
};
use projection::GridMapping;
use storage::{
    build_object_store, CatalogSeed, FieldStore, MemoryCatalog, ObjectFieldStore, PgCatalog,
    PointQuery, ProjectionRegistry, RedisQueue, SourceCatalog,
};
use wx_common::{metrics, Projection, ProjectionId, SourceField};

use crate::config::IngesterConfig;
use crate::config_loader::load_seeds;

/// Longest summary the summarize command produces.
pub const MAX_SUMMARY_DAYS: u32 = 10;

/// Catalog handles; both point at the same backend.
#[derive(Clone)]
pub struct Catalog {
    pub sources: Arc<dyn SourceCatalog>,
    pub projections: Arc<dyn ProjectionRegistry>,
}

impl Catalog {
    /// PostgreSQL when configured (seeds are upserted), otherwise an
    /// in-memory catalog built from the seeds.
    pub async fn open(config: &IngesterConfig, seeds: &[PathBuf]) -> Result<Self> {
        let seed = if seeds.is_empty() {
            None
        } else {
            Some(load_seeds(seeds)?)
        };

        match &config.database_url {
            Some(url) => {
                let catalog = Arc::new(
                    PgCatalog::connect(url)
                        .await
                        .context("Failed to connect to catalog database")?,
                );
                catalog.migrate().await.context("Catalog migration failed")?;
                if let Some(seed) = &seed {
                    catalog.apply_seed(seed).await.context("Failed to apply seed")?;
                }
                Ok(Self {
                    sources: catalog.clone(),
                    projections: catalog,
                })
            }
            None => {
                let Some(seed) = seed else {
                    bail!("Either DATABASE_URL or at least one --seed is required");
                };
                Self::in_memory(&seed)
            }
        }
    }

    pub fn in_memory(seed: &CatalogSeed) -> Result<Self> {
        let catalog = Arc::new(MemoryCatalog::from_seed(seed)?);
        Ok(Self {
            sources: catalog.clone(),
            projections: catalog,
        })
    }
}

pub fn field_store(config: &IngesterConfig) -> Result<Arc<dyn FieldStore>> {
    let store = build_object_store(&config.storage).context("Failed to open field store")?;
    Ok(Arc::new(ObjectFieldStore::new(store)))
}

pub fn ingestor(
    config: &IngesterConfig,
    catalog: &Catalog,
    store: Arc<dyn FieldStore>,
) -> GribIngestor {
    GribIngestor::new(catalog.sources.clone(), catalog.projections.clone(), store)
        .with_max_chunk_size(config.max_chunk_size)
}

/// Drain the ingest queue.
pub async fn run_worker(config: &IngesterConfig, catalog: Catalog) -> Result<WorkerStats> {
    let queue = RedisQueue::connect(&config.redis_url, config.queue_key.clone())
        .await
        .context("Failed to connect to queue")?;
    info!(queue = %config.queue_key, pending = queue.len().await?, "Connected to queue");

    let fetcher = HttpFetcher::new(config.fetch.clone())?;
    let worker = Worker::new(
        Arc::new(queue),
        Arc::new(fetcher),
        ingestor(config, &catalog, field_store(config)?),
        config.policy.clone(),
    );
    Ok(worker.run().await?)
}

/// Reduce and ingest local GRIB files.
pub async fn import_files(
    ingestor: &GribIngestor,
    source: &str,
    files: &[PathBuf],
) -> Result<Vec<IngestStats>> {
    let stats = import_local(ingestor, source, files)
        .await
        .with_context(|| format!("Import for {} failed", source))?;
    Ok(stats)
}

/// Download the configured fields of `source` from a remote GRIB file.
#[instrument(skip(config, catalog))]
pub async fn reduce_to_file(
    config: &IngesterConfig,
    catalog: &Catalog,
    grib_url: &str,
    idx_url: &str,
    source: &str,
    out: &Path,
) -> Result<ReduceStats> {
    let source = catalog.sources.source_by_short_name(source).await?;
    let fields = catalog.sources.source_fields(source.id).await?;

    let fetcher = HttpFetcher::new(config.fetch.clone())?;
    let mut sink = tokio::fs::File::create(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;
    Ok(reduce(&fetcher, grib_url, idx_url, &fields, &mut sink).await?)
}

/// Location and window of a summary request.
#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub lat: f64,
    pub lon: f64,
    pub start: DateTime<Utc>,
    pub days: u32,
    /// Offset of local time from UTC, in hours
    pub utc_offset_hours: i32,
}

impl SummaryRequest {
    pub fn validate(&self) -> Result<FixedOffset> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            bail!("Location {}, {} is out of range", self.lat, self.lon);
        }
        if self.days == 0 || self.days > MAX_SUMMARY_DAYS {
            bail!("days must be between 1 and {}", MAX_SUMMARY_DAYS);
        }
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .with_context(|| format!("Invalid UTC offset: {}", self.utc_offset_hours))
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub lat: f64,
    pub lon: f64,
    pub days: Vec<SummarizedData>,
}

/// Load the data points around a location and summarize them per day.
#[instrument(skip(catalog, store), fields(lat = request.lat, lon = request.lon))]
pub async fn summarize(
    catalog: &Catalog,
    store: &dyn FieldStore,
    request: &SummaryRequest,
) -> Result<SummaryResponse> {
    let offset = request.validate()?;
    let end = request.start + Duration::days(request.days as i64);

    let fields = catalog
        .sources
        .fields_for_metrics(&metrics::summary_metrics())
        .await?;

    let mut points = Vec::new();
    for (projection, fields) in by_projection(fields) {
        let Some(index) = GridMapping::from_params(&projection.params)
            .nearest_index(request.lat, request.lon)
        else {
            debug!(projection = projection.id.0, "Location outside grid");
            continue;
        };

        let query = PointQuery {
            projection: projection.id,
            index,
            start: request.start,
            end,
            fields: fields.iter().map(|f| (f.id, f.metric.id)).collect(),
        };
        points.extend(store.load_data_points(&query).await?);
    }
    info!(points = points.len(), "Loaded data points");

    let combined = combine_models(&points);
    let days = daily_windows(request.start, request.days, offset)
        .into_iter()
        .map(|(start, end)| SummarizedData::new(start, end, &combined))
        .collect();

    Ok(SummaryResponse {
        lat: request.lat,
        lon: request.lon,
        days,
    })
}

/// Fields with a known projection, grouped by it.
fn by_projection(fields: Vec<SourceField>) -> Vec<(Projection, Vec<SourceField>)> {
    let mut groups: BTreeMap<ProjectionId, (Projection, Vec<SourceField>)> = BTreeMap::new();
    for field in fields {
        let Some(projection) = field.projection.clone() else {
            continue;
        };
        groups
            .entry(projection.id)
            .or_insert_with(|| (projection, Vec::new()))
            .1
            .push(field);
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(lat: f64, lon: f64, days: u32, offset: i32) -> SummaryRequest {
        SummaryRequest {
            lat,
            lon,
            start: Utc::now(),
            days,
            utc_offset_hours: offset,
        }
    }

    #[test]
    fn test_summary_request_validation() {
        assert!(request(41.0, -87.0, 3, -6).validate().is_ok());
        assert!(request(91.0, -87.0, 3, 0).validate().is_err());
        assert!(request(41.0, 181.0, 3, 0).validate().is_err());
        assert!(request(41.0, -87.0, 0, 0).validate().is_err());
        assert!(request(41.0, -87.0, 11, 0).validate().is_err());
        assert!(request(41.0, -87.0, 1, 30).validate().is_err());
    }
}
