//! Queue worker: reduce and ingest requested GRIB files until the queue
//! runs dry.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, info_span, instrument, warn, Instrument};

use storage::IngestQueue;
use wx_common::IngestRequest;

use crate::config::WorkerPolicy;
use crate::error::Result;
use crate::grib::{GribIngestor, IngestStats};
use crate::reduce::{reduce, UrlFetcher};

/// What happened to one queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Ingested(IngestStats),
    /// Valid time too old; dropped
    Expired,
    /// GRIB or index not published yet; re-queued
    Missing,
    /// Processing failed; re-queued
    Failed,
}

/// Totals over one worker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ingested: usize,
    pub expired: usize,
    pub missing: usize,
    pub failed: usize,
}

impl WorkerStats {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Ingested(_) => self.ingested += 1,
            ItemOutcome::Expired => self.expired += 1,
            ItemOutcome::Missing => self.missing += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

pub struct Worker {
    queue: Arc<dyn IngestQueue>,
    fetcher: Arc<dyn UrlFetcher>,
    ingestor: GribIngestor,
    policy: WorkerPolicy,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn IngestQueue>,
        fetcher: Arc<dyn UrlFetcher>,
        ingestor: GribIngestor,
        policy: WorkerPolicy,
    ) -> Self {
        Self {
            queue,
            fetcher,
            ingestor,
            policy,
        }
    }

    /// Process items until none is ready. Only queue errors end the run
    /// early; item failures are re-queued.
    pub async fn run(&self) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();

        while let Some(request) = self.queue.pop().await? {
            let outcome = self.handle(&request).await?;
            stats.record(&outcome);
        }

        info!(
            ingested = stats.ingested,
            expired = stats.expired,
            missing = stats.missing,
            failed = stats.failed,
            "Empty queue"
        );
        Ok(stats)
    }

    #[instrument(skip(self, request), fields(url = %request.url, source = %request.source))]
    pub async fn handle(&self, request: &IngestRequest) -> Result<ItemOutcome> {
        if request.is_expired(Utc::now(), self.policy.max_age) {
            info!(valid_time = %request.valid_at(), "Expiring old request");
            return Ok(ItemOutcome::Expired);
        }

        if !self.published(request).await {
            info!(delay_secs = self.policy.missing_retry.as_secs(), "Rescheduling request");
            self.queue.put(request, self.policy.missing_retry).await?;
            return Ok(ItemOutcome::Missing);
        }

        match self
            .process(request)
            .instrument(info_span!("ingest item"))
            .await
        {
            Ok(stats) => Ok(ItemOutcome::Ingested(stats)),
            Err(e) => {
                error!(error = %e, "Exception while ingesting, will retry");
                self.queue.put(request, self.policy.failure_retry).await?;
                Ok(ItemOutcome::Failed)
            }
        }
    }

    async fn published(&self, request: &IngestRequest) -> bool {
        for url in [&request.url, &request.idx_url] {
            match self.fetcher.exists(url).await {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!(error = %e, url = %url, "Existence check failed");
                    return false;
                }
            }
        }
        true
    }

    async fn process(&self, request: &IngestRequest) -> Result<IngestStats> {
        let source = self.ingestor.source(&request.source).await?;
        let fields = self.ingestor.catalog().source_fields(source.id).await?;

        let reduced = tempfile::NamedTempFile::new()?;
        {
            let mut sink = tokio::fs::File::from_std(reduced.reopen()?);
            info!(run_time = %request.run_at(), "Downloading and reducing");
            reduce(
                self.fetcher.as_ref(),
                &request.url,
                &request.idx_url,
                &fields,
                &mut sink,
            )
            .instrument(info_span!("download"))
            .await?;
        }

        let stats = self
            .ingestor
            .ingest_file(reduced.path(), &source)
            .instrument(info_span!("ingest"))
            .await?;

        self.ingestor
            .catalog()
            .mark_updated(source.id, Utc::now())
            .await?;
        Ok(stats)
    }
}
