//! Chunked ingestion of GRIB files into the field store.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, debug_span, info, info_span, instrument, warn, Instrument};

use grib2_parser::{Grib2Error, Grib2Message, GribFile, GribSource};
use storage::{FieldStore, ProjectionRegistry, SourceCatalog};
use wx_common::{FieldKey, Projection, Source, SourceField, StepType, WxError};

use crate::chunk::{estimated_size, Chunk};
use crate::config::{BYTES_PER_VALUE, DEFAULT_MAX_CHUNK_SIZE};
use crate::derived::{DerivedContext, DerivedRegistry};
use crate::error::{IngestionError, Result};

/// Valid time of a message, moved to the end of the processing interval
/// for statistically processed (averaged, accumulated, ...) fields.
///
/// Units without a fixed length leave the valid time unchanged. A time
/// range that runs past the representable dates is a decode error.
pub fn end_valid_time(msg: &Grib2Message) -> Result<DateTime<Utc>> {
    let valid = msg.valid_date()?;
    if msg.step_type() == StepType::Instant {
        return Ok(valid);
    }

    let (Some(length), Some(unit)) = (msg.length_of_time_range(), msg.time_range_unit()) else {
        return Ok(valid);
    };
    if !unit.is_fixed() {
        return Ok(valid);
    }
    unit.advance(valid, length as i64).ok_or_else(|| {
        Grib2Error::InvalidSection {
            section: 4,
            reason: format!("Time range {} {} is out of range", length, unit.as_str()),
        }
        .into()
    })
}

/// Counters from one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Messages decoded for direct fields
    pub messages: usize,
    /// Derived keys merged into the chunk
    pub derived_keys: usize,
    pub flushes: usize,
    /// Estimated bytes handed to the field store
    pub bytes_queued: usize,
    /// Configured fields with no matching message (tolerated misses excluded)
    pub missing_fields: usize,
}

/// Closes the wrapped source when dropped, on every exit path.
struct CloseGuard<'a> {
    inner: &'a mut dyn GribSource,
}

impl<'a> CloseGuard<'a> {
    fn new(inner: &'a mut dyn GribSource) -> Self {
        Self { inner }
    }
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Matches a source's configured fields against GRIB messages and streams
/// the decoded values to the field store in bounded chunks.
pub struct GribIngestor {
    catalog: Arc<dyn SourceCatalog>,
    projections: Arc<dyn ProjectionRegistry>,
    store: Arc<dyn FieldStore>,
    derived: DerivedRegistry,
    max_chunk_size: usize,
}

impl GribIngestor {
    pub fn new(
        catalog: Arc<dyn SourceCatalog>,
        projections: Arc<dyn ProjectionRegistry>,
        store: Arc<dyn FieldStore>,
    ) -> Self {
        Self {
            catalog,
            projections,
            store,
            derived: DerivedRegistry::builtin(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }

    /// Ceiling in estimated bytes (values x 8) for one chunk.
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    pub fn with_derived(mut self, derived: DerivedRegistry) -> Self {
        self.derived = derived;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn SourceCatalog> {
        &self.catalog
    }

    /// Look up a source by short name.
    pub async fn source(&self, short_name: &str) -> Result<Source> {
        self.catalog
            .source_by_short_name(short_name)
            .await
            .map_err(|e| match e {
                WxError::UnknownSource(name) => IngestionError::UnknownSource(name),
                other => other.into(),
            })
    }

    #[instrument(skip(self, source), fields(source = %source.short_name, path = %path.display()))]
    pub async fn ingest_file(&self, path: &Path, source: &Source) -> Result<IngestStats> {
        info!("Processing GRIB file");
        let mut file = GribFile::open(path)?;
        self.ingest_source(&mut file, source).await
    }

    /// Ingest every configured field of `source` found in `grib`.
    ///
    /// `grib` is closed before this returns, whether it succeeds, fails or
    /// is cancelled.
    pub async fn ingest_source(
        &self,
        grib: &mut dyn GribSource,
        source: &Source,
    ) -> Result<IngestStats> {
        let mut grib = CloseGuard::new(grib);
        let fields = self.catalog.source_fields(source.id).await?;

        let mut chunk = Chunk::new(self.max_chunk_size);
        let mut stats = IngestStats::default();

        for mut field in fields.iter().filter(|f| !f.metric.intermediate).cloned() {
            let messages = match grib.inner.select(&field.selector) {
                Ok(messages) => messages,
                Err(Grib2Error::NoMatch(what)) => {
                    if !field.selector.is_tolerated_miss() {
                        warn!(selector = %what, "Could not find message(s) in GRIB matching selector");
                        stats.missing_fields += 1;
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for msg in &messages {
                let valid = msg.valid_date()?;
                let span = debug_span!(
                    "parse message",
                    short_name = msg.short_name(),
                    level = msg.level(),
                    valid = %valid
                );
                self.ingest_message(&mut field, msg, &mut chunk, &mut stats)
                    .instrument(span)
                    .await?;
            }
        }

        if let Some(generator) = self.derived.get(&source.short_name) {
            let ctx = DerivedContext {
                source,
                fields: &fields,
                projections: self.projections.as_ref(),
            };
            let derived = generator
                .generate_derived(&mut *grib.inner, &ctx)
                .instrument(info_span!("generate derived"))
                .await?;

            for (projection, bucket) in derived {
                for (key, arrays) in bucket {
                    let size = estimated_size(&arrays);
                    if chunk.would_overflow(size) {
                        self.flush(&mut chunk, &mut stats)
                            .instrument(info_span!("save chunk"))
                            .await?;
                    }
                    chunk.add(&projection, key, arrays);
                    stats.derived_keys += 1;
                    stats.bytes_queued += size;
                }
            }
        }

        if !chunk.is_empty() {
            self.flush(&mut chunk, &mut stats)
                .instrument(info_span!("save final chunk"))
                .await?;
        }

        info!(
            messages = stats.messages,
            derived = stats.derived_keys,
            flushes = stats.flushes,
            "Done saving field data"
        );
        Ok(stats)
    }

    async fn ingest_message(
        &self,
        field: &mut SourceField,
        msg: &Grib2Message,
        chunk: &mut Chunk,
        stats: &mut IngestStats,
    ) -> Result<()> {
        let projection = self.resolve_projection(field, msg).await?;
        let valid = end_valid_time(msg)?;
        let values = msg.values()?;
        let size = values.len() * BYTES_PER_VALUE;

        if chunk.would_overflow(size) {
            self.flush(chunk, stats)
                .instrument(info_span!("save chunk"))
                .await?;
        }

        chunk.add(
            &projection,
            FieldKey::new(field.id, valid, msg.anal_date()),
            vec![values],
        );
        stats.messages += 1;
        stats.bytes_queued += size;
        Ok(())
    }

    /// The field's projection, replaced (and persisted) when the message
    /// reports a different grid.
    async fn resolve_projection(
        &self,
        field: &mut SourceField,
        msg: &Grib2Message,
    ) -> Result<Projection> {
        let params = msg.projection_params()?;
        if let Some(current) = &field.projection {
            if current.params == params {
                return Ok(current.clone());
            }
        }

        let projection = self.projections.get_or_create_projection(&params).await?;
        self.catalog
            .set_field_projection(field.id, projection.id)
            .await?;
        debug!(field = field.id.0, projection = projection.id.0, "Updated field projection");
        field.projection = Some(projection.clone());
        Ok(projection)
    }

    async fn flush(&self, chunk: &mut Chunk, stats: &mut IngestStats) -> Result<()> {
        info!(size = chunk.size(), "Storing chunk");
        for (projection, fields) in chunk.take() {
            self.store.put_fields(&projection, fields).await?;
        }
        stats.flushes += 1;
        Ok(())
    }
}
