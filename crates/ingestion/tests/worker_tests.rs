//! Queue worker against a fake remote and in-memory storage.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use ingestion::{ByteRange, FetchError, GribIngestor, ItemOutcome, UrlFetcher, Worker, WorkerPolicy};
use object_store::memory::InMemory;
use storage::{
    CatalogSeed, FieldSeed, IngestQueue, MemoryCatalog, MemoryQueue, ObjectFieldStore, SourceSeed,
};
use test_utils::{create_temperature_grid, Grib2Builder, IndexBuilder};
use wx_common::{metrics, GribSelector, IndexSelector, IngestRequest, SourceId};

const GRIB_URL: &str = "https://nomads.example.com/gfs.t12z.pgrb2.0p25.f001";
const IDX_URL: &str = "https://nomads.example.com/gfs.t12z.pgrb2.0p25.f001.idx";

/// Serves fixed bodies; any other URL is a 404.
#[derive(Default)]
struct FakeRemote {
    files: HashMap<String, Bytes>,
}

impl FakeRemote {
    fn with(mut self, url: &str, body: impl Into<Bytes>) -> Self {
        self.files.insert(url.to_string(), body.into());
        self
    }

    fn body(&self, url: &str) -> Result<&Bytes, FetchError> {
        self.files.get(url).ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[async_trait]
impl UrlFetcher for FakeRemote {
    async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        self.body(url).cloned()
    }

    async fn get_range(&self, url: &str, range: ByteRange) -> Result<Bytes, FetchError> {
        let body = self.body(url)?;
        let end = (range.start + range.length).min(body.len() as u64);
        Ok(body.slice(range.start as usize..end as usize))
    }

    async fn exists(&self, url: &str) -> Result<bool, FetchError> {
        Ok(self.files.contains_key(url))
    }
}

fn published() -> FakeRemote {
    let fixture = IndexBuilder::new("2024011512")
        .add(
            "TMP",
            "2 m above ground",
            "1 hour fcst",
            Grib2Builder::new_gfs()
                .with_forecast_hour(1)
                .with_values(create_temperature_grid(4, 3))
                .build(),
        )
        .add(
            "RH",
            "2 m above ground",
            "1 hour fcst",
            Grib2Builder::new_gfs()
                .with_parameter(1, 1)
                .with_forecast_hour(1)
                .build(),
        )
        .build();
    FakeRemote::default()
        .with(GRIB_URL, fixture.grib)
        .with(IDX_URL, fixture.index)
}

fn catalog() -> Arc<MemoryCatalog> {
    let seed = CatalogSeed {
        metrics: vec![],
        sources: vec![SourceSeed {
            short_name: "gfs".into(),
            name: "GFS 0.25 Degree".into(),
            src_url: None,
            fields: vec![FieldSeed {
                metric: metrics::TEMP,
                idx: IndexSelector::new("TMP", "2 m above ground"),
                grib: GribSelector::new("TMP", "2 m above ground"),
            }],
        }],
    };
    Arc::new(MemoryCatalog::from_seed(&seed).unwrap())
}

fn request(source: &str, valid_offset: Duration) -> IngestRequest {
    let valid = Utc::now() + valid_offset;
    IngestRequest {
        url: GRIB_URL.into(),
        idx_url: IDX_URL.into(),
        source: source.into(),
        valid_time: valid.timestamp(),
        run_time: (valid - Duration::hours(1)).timestamp(),
    }
}

struct Harness {
    catalog: Arc<MemoryCatalog>,
    queue: Arc<MemoryQueue>,
    worker: Worker,
}

fn harness(remote: FakeRemote) -> Harness {
    let catalog = catalog();
    let queue = Arc::new(MemoryQueue::new());
    let store = Arc::new(ObjectFieldStore::new(Arc::new(InMemory::new())));
    let ingestor = GribIngestor::new(catalog.clone(), catalog.clone(), store);
    let worker = Worker::new(
        queue.clone(),
        Arc::new(remote),
        ingestor,
        WorkerPolicy::default(),
    );
    Harness {
        catalog,
        queue,
        worker,
    }
}

#[tokio::test]
async fn test_published_item_is_ingested() {
    let h = harness(published());
    h.queue
        .put(&request("gfs", Duration::hours(1)), std::time::Duration::ZERO)
        .await
        .unwrap();

    let stats = h.worker.run().await.unwrap();
    assert_eq!(stats.ingested, 1);
    assert!(h.queue.is_empty().await);

    let source = h.catalog.source(SourceId(1)).await.unwrap();
    assert!(source.last_updated.is_some());
}

#[tokio::test]
async fn test_only_selected_ranges_are_ingested() {
    let h = harness(published());
    let outcome = h
        .worker
        .handle(&request("gfs", Duration::hours(1)))
        .await
        .unwrap();

    let ItemOutcome::Ingested(stats) = outcome else {
        panic!("expected ingestion, got {:?}", outcome);
    };
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.missing_fields, 0);
}

#[tokio::test]
async fn test_expired_item_is_dropped() {
    let h = harness(published());
    h.queue
        .put(&request("gfs", -Duration::hours(13)), std::time::Duration::ZERO)
        .await
        .unwrap();

    let stats = h.worker.run().await.unwrap();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.ingested, 0);
    assert!(h.queue.is_empty().await);
}

#[tokio::test]
async fn test_unpublished_item_is_rescheduled() {
    // Index published, GRIB not yet
    let remote = FakeRemote::default().with(IDX_URL, "1:0:d=2024011512:TMP:2 m above ground:anl:\n");
    let h = harness(remote);
    h.queue
        .put(&request("gfs", Duration::hours(1)), std::time::Duration::ZERO)
        .await
        .unwrap();

    let before = Utc::now();
    let stats = h.worker.run().await.unwrap();
    assert_eq!(stats.missing, 1);

    let queued = h.queue.snapshot().await;
    assert_eq!(queued.len(), 1);
    assert!(queued[0].0 >= before + Duration::seconds(300));
}

#[tokio::test]
async fn test_failed_item_is_retried_later() {
    let h = harness(published());
    h.queue
        .put(&request("metar", Duration::hours(1)), std::time::Duration::ZERO)
        .await
        .unwrap();

    let before = Utc::now();
    let stats = h.worker.run().await.unwrap();
    assert_eq!(stats.failed, 1);

    let queued = h.queue.snapshot().await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].1.source, "metar");
    assert!(queued[0].0 >= before + Duration::seconds(240));
    assert!(queued[0].0 < before + Duration::seconds(300));
}

#[tokio::test]
async fn test_empty_queue_stops_immediately() {
    let h = harness(published());
    let stats = h.worker.run().await.unwrap();
    assert_eq!(stats, Default::default());
}
