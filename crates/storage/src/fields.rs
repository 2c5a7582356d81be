//! Field storage: decoded value arrays persisted per (field, valid, run).
//!
//! Each key is one object at `fields/{projection}/{field}/{valid}/{run}.bin`
//! (times as Unix seconds) laid out as:
//!
//! ```text
//! "WXF1" | array count: u32 LE | points per array: u32 LE | f32 LE values...
//! ```

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::{path::Path, ObjectStore};
use std::sync::Arc;
use tracing::{debug, instrument};

use wx_common::{
    from_unix, DataPoint, FieldBucket, FieldKey, MetricId, Projection, ProjectionId,
    SourceFieldId, WxError, WxResult,
};

const MAGIC: &[u8; 4] = b"WXF1";
const HEADER_LEN: usize = 12;

/// Sink for decoded fields and source of point samples.
#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Persist every key of `fields` under `projection`.
    ///
    /// Arrays already stored for a key are not stored twice, so ingesting
    /// the same file again leaves the store unchanged.
    async fn put_fields(&self, projection: &Projection, fields: FieldBucket) -> WxResult<()>;

    /// Sample stored keys at one grid point.
    async fn load_data_points(&self, query: &PointQuery) -> WxResult<Vec<DataPoint>>;
}

/// One grid point of one projection over a valid-time window.
#[derive(Debug, Clone)]
pub struct PointQuery {
    pub projection: ProjectionId,
    /// Offset into the stored arrays
    pub index: usize,
    /// Inclusive
    pub start: DateTime<Utc>,
    /// Exclusive
    pub end: DateTime<Utc>,
    pub fields: Vec<(SourceFieldId, MetricId)>,
}

/// [`FieldStore`] over any `object_store` backend.
pub struct ObjectFieldStore {
    store: Arc<dyn ObjectStore>,
}

impl ObjectFieldStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    fn key_path(projection: ProjectionId, key: &FieldKey) -> Path {
        Path::from(format!(
            "fields/{}/{}/{}/{}.bin",
            projection.0,
            key.field_id.0,
            key.valid_time.timestamp(),
            key.run_time.timestamp()
        ))
    }

    async fn read_arrays(&self, path: &Path) -> WxResult<Option<Vec<Vec<f32>>>> {
        match self.store.get(path).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(|e| {
                    WxError::StorageError(format!("Failed to read {}: {}", path, e))
                })?;
                decode_arrays(&bytes).map(Some)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(WxError::StorageError(format!(
                "Failed to read {}: {}",
                path, e
            ))),
        }
    }

    #[instrument(skip(self, arrays), fields(path = %path, arrays = arrays.len()))]
    async fn merge_key(&self, path: &Path, arrays: Vec<Vec<f32>>) -> WxResult<()> {
        let mut stored = self.read_arrays(path).await?.unwrap_or_default();
        let before = stored.len();

        // Each previously stored array absorbs at most one identical
        // incoming array; identical arrays within one put are all kept.
        let mut matched = vec![false; before];
        for array in arrays {
            let existing = (0..before).find(|&i| !matched[i] && same_values(&stored[i], &array));
            match existing {
                Some(i) => matched[i] = true,
                None => stored.push(array),
            }
        }

        if stored.len() == before {
            debug!("Key already up to date");
            return Ok(());
        }

        let encoded = encode_arrays(&stored)?;
        debug!(size = encoded.len(), "Writing field object");
        self.store
            .put(path, encoded.into())
            .await
            .map_err(|e| WxError::StorageError(format!("Failed to write {}: {}", path, e)))?;
        Ok(())
    }

    /// Read only the value at `index` of every array stored at `path`.
    async fn sample(&self, path: &Path, index: usize) -> WxResult<Vec<f32>> {
        let header = self
            .store
            .get_range(path, 0..HEADER_LEN)
            .await
            .map_err(|e| WxError::StorageError(format!("Failed to read {}: {}", path, e)))?;
        let (count, points) = decode_header(&header)?;
        if index >= points {
            return Err(WxError::InvalidData(format!(
                "Grid index {} out of range for {} points in {}",
                index, points, path
            )));
        }

        let ranges: Vec<_> = (0..count)
            .map(|a| {
                let start = HEADER_LEN + (a * points + index) * 4;
                start..start + 4
            })
            .collect();
        let chunks = self
            .store
            .get_ranges(path, &ranges)
            .await
            .map_err(|e| WxError::StorageError(format!("Failed to read {}: {}", path, e)))?;

        chunks
            .iter()
            .map(|b| {
                let raw: [u8; 4] = b.as_ref().try_into().map_err(|_| {
                    WxError::InvalidData(format!("Short read from {}", path))
                })?;
                Ok(f32::from_le_bytes(raw))
            })
            .collect()
    }
}

#[async_trait]
impl FieldStore for ObjectFieldStore {
    #[instrument(skip(self, fields), fields(projection = projection.id.0, keys = fields.len()))]
    async fn put_fields(&self, projection: &Projection, fields: FieldBucket) -> WxResult<()> {
        for (key, arrays) in fields {
            let path = Self::key_path(projection.id, &key);
            self.merge_key(&path, arrays).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, query), fields(projection = query.projection.0, index = query.index))]
    async fn load_data_points(&self, query: &PointQuery) -> WxResult<Vec<DataPoint>> {
        let mut points = Vec::new();

        for (field_id, metric_id) in &query.fields {
            let prefix = Path::from(format!("fields/{}/{}", query.projection.0, field_id.0));
            let metas: Vec<_> = self
                .store
                .list(Some(&prefix))
                .try_collect()
                .await
                .map_err(|e| WxError::StorageError(format!("List failed: {}", e)))?;

            for meta in metas {
                let Some((valid_time, run_time)) = parse_key_times(&meta.location) else {
                    debug!(path = %meta.location, "Skipping unrecognised object");
                    continue;
                };
                if valid_time < query.start || valid_time >= query.end {
                    continue;
                }

                let values = self.sample(&meta.location, query.index).await?;
                points.push(DataPoint {
                    source_field_id: *field_id,
                    metric_id: *metric_id,
                    valid_time,
                    run_time,
                    values,
                });
            }
        }

        points.sort_by(|a, b| {
            (a.metric_id, a.valid_time, a.source_field_id, a.run_time)
                .cmp(&(b.metric_id, b.valid_time, b.source_field_id, b.run_time))
        });
        debug!(count = points.len(), "Loaded data points");
        Ok(points)
    }
}

/// (valid, run) from `.../{valid}/{run}.bin`.
fn parse_key_times(path: &Path) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let parts: Vec<_> = path.parts().collect();
    let n = parts.len();
    if n < 2 {
        return None;
    }
    let valid: i64 = parts[n - 2].as_ref().parse().ok()?;
    let run: i64 = parts[n - 1].as_ref().strip_suffix(".bin")?.parse().ok()?;
    Some((from_unix(valid), from_unix(run)))
}

/// Bitwise comparison so NaN arrays compare equal to themselves.
fn same_values(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn encode_arrays(arrays: &[Vec<f32>]) -> WxResult<Bytes> {
    let points = arrays.first().map(|a| a.len()).unwrap_or(0);
    if arrays.iter().any(|a| a.len() != points) {
        return Err(WxError::InvalidData(
            "Arrays of one key must have the same length".to_string(),
        ));
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN + arrays.len() * points * 4);
    buf.put_slice(MAGIC);
    buf.put_u32_le(arrays.len() as u32);
    buf.put_u32_le(points as u32);
    for array in arrays {
        for v in array {
            buf.put_f32_le(*v);
        }
    }
    Ok(buf.freeze())
}

fn decode_header(bytes: &[u8]) -> WxResult<(usize, usize)> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(WxError::InvalidData("Not a field object".to_string()));
    }
    let count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let points = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    Ok((count, points))
}

fn decode_arrays(bytes: &[u8]) -> WxResult<Vec<Vec<f32>>> {
    let (count, points) = decode_header(bytes)?;
    let body = &bytes[HEADER_LEN..];
    if body.len() != count * points * 4 {
        return Err(WxError::InvalidData(format!(
            "Field object has {} bytes, expected {}",
            body.len(),
            count * points * 4
        )));
    }

    Ok(body
        .chunks_exact(points.max(1) * 4)
        .take(count)
        .map(|array| {
            array
                .chunks_exact(4)
                .map(|v| f32::from_le_bytes([v[0], v[1], v[2], v[3]]))
                .collect()
        })
        .collect())
}
