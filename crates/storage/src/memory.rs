//! In-process catalog and queue for local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use wx_common::{
    IngestRequest, MetricId, Projection, ProjectionId, ProjectionParams, Source, SourceField,
    SourceFieldId, SourceId, WxError, WxResult,
};

use crate::catalog::{ProjectionRegistry, SourceCatalog};
use crate::queue::IngestQueue;
use crate::seed::CatalogSeed;

#[derive(Default)]
struct CatalogState {
    sources: Vec<Source>,
    fields: Vec<SourceField>,
    projections: Vec<Projection>,
}

/// Catalog held in memory. Ids are assigned sequentially from 1.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: &CatalogSeed) -> WxResult<Self> {
        seed.validate()?;
        let metrics = seed.all_metrics();
        let mut state = CatalogState::default();

        for (s, source) in seed.sources.iter().enumerate() {
            let source_id = SourceId(s as i64 + 1);
            state.sources.push(Source {
                id: source_id,
                short_name: source.short_name.clone(),
                name: source.name.clone(),
                src_url: source.src_url.clone(),
                last_updated: None,
            });

            for field in &source.fields {
                let metric = metrics
                    .iter()
                    .find(|m| m.id == field.metric)
                    .cloned()
                    .ok_or_else(|| {
                        WxError::ConfigError(format!("Unknown metric {}", field.metric.0))
                    })?;
                let id = SourceFieldId(state.fields.len() as i64 + 1);
                state.fields.push(SourceField {
                    id,
                    source_id,
                    metric,
                    idx: field.idx.clone(),
                    selector: field.grib.clone(),
                    projection: None,
                });
            }
        }

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub async fn projections(&self) -> Vec<Projection> {
        self.state.read().await.projections.clone()
    }

    pub async fn source(&self, id: SourceId) -> Option<Source> {
        self.state
            .read()
            .await
            .sources
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }
}

#[async_trait]
impl ProjectionRegistry for MemoryCatalog {
    async fn get_or_create_projection(&self, params: &ProjectionParams) -> WxResult<Projection> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.projections.iter().find(|p| &p.params == params) {
            return Ok(existing.clone());
        }
        let projection = Projection {
            id: ProjectionId(state.projections.len() as i64 + 1),
            params: params.clone(),
        };
        state.projections.push(projection.clone());
        Ok(projection)
    }
}

#[async_trait]
impl SourceCatalog for MemoryCatalog {
    async fn source_by_short_name(&self, short_name: &str) -> WxResult<Source> {
        self.state
            .read()
            .await
            .sources
            .iter()
            .find(|s| s.short_name == short_name)
            .cloned()
            .ok_or_else(|| WxError::UnknownSource(short_name.to_string()))
    }

    async fn source_fields(&self, source_id: SourceId) -> WxResult<Vec<SourceField>> {
        Ok(self
            .state
            .read()
            .await
            .fields
            .iter()
            .filter(|f| f.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn set_field_projection(
        &self,
        field_id: SourceFieldId,
        projection_id: ProjectionId,
    ) -> WxResult<()> {
        let mut state = self.state.write().await;
        let projection = state
            .projections
            .iter()
            .find(|p| p.id == projection_id)
            .cloned()
            .ok_or_else(|| WxError::NotFound(format!("projection {}", projection_id.0)))?;
        let field = state
            .fields
            .iter_mut()
            .find(|f| f.id == field_id)
            .ok_or_else(|| WxError::NotFound(format!("source field {}", field_id.0)))?;
        field.projection = Some(projection);
        Ok(())
    }

    async fn mark_updated(&self, source_id: SourceId, at: DateTime<Utc>) -> WxResult<()> {
        let mut state = self.state.write().await;
        let source = state
            .sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| WxError::NotFound(format!("source {}", source_id.0)))?;
        source.last_updated = Some(at);
        Ok(())
    }

    async fn fields_for_metrics(&self, metrics: &[MetricId]) -> WxResult<Vec<SourceField>> {
        Ok(self
            .state
            .read()
            .await
            .fields
            .iter()
            .filter(|f| metrics.contains(&f.metric.id))
            .cloned()
            .collect())
    }
}

/// Delayed queue ordered by ready time, then insertion.
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<Vec<(DateTime<Utc>, IngestRequest)>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Queued items with their ready times, in pop order.
    pub async fn snapshot(&self) -> Vec<(DateTime<Utc>, IngestRequest)> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl IngestQueue for MemoryQueue {
    async fn put(&self, item: &IngestRequest, delay: Duration) -> WxResult<()> {
        let delay = ChronoDuration::from_std(delay)
            .map_err(|e| WxError::QueueError(format!("Invalid delay: {}", e)))?;
        let ready_at = Utc::now() + delay;

        let mut items = self.items.lock().await;
        let pos = items.partition_point(|(t, _)| *t <= ready_at);
        items.insert(pos, (ready_at, item.clone()));
        Ok(())
    }

    async fn pop(&self) -> WxResult<Option<IngestRequest>> {
        let mut items = self.items.lock().await;
        match items.first() {
            Some((ready_at, _)) if *ready_at <= Utc::now() => Ok(Some(items.remove(0).1)),
            _ => Ok(None),
        }
    }
}
