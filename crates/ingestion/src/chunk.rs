//! Size-bounded accumulation of decoded fields awaiting a store flush.

use std::collections::BTreeMap;

use wx_common::{FieldBucket, FieldKey, Projection, ProjectionId};

use crate::config::BYTES_PER_VALUE;

/// Estimated size of `arrays` once decoded.
pub fn estimated_size(arrays: &[Vec<f32>]) -> usize {
    arrays.iter().map(|a| a.len() * BYTES_PER_VALUE).sum()
}

/// Decoded arrays grouped by projection, then by field key.
///
/// Arrays for the same key accumulate in insertion order. Callers check
/// [`Chunk::would_overflow`] before every [`Chunk::add`] and flush first
/// when it returns true, so a chunk never exceeds its ceiling by more than
/// one addition.
#[derive(Debug)]
pub struct Chunk {
    buckets: BTreeMap<ProjectionId, (Projection, FieldBucket)>,
    size: usize,
    max_size: usize,
}

impl Chunk {
    pub fn new(max_size: usize) -> Self {
        Self {
            buckets: BTreeMap::new(),
            size: 0,
            max_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Estimated bytes held.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether adding `additional` bytes would cross the ceiling. An empty
    /// chunk always accepts the addition.
    pub fn would_overflow(&self, additional: usize) -> bool {
        !self.is_empty() && self.size + additional > self.max_size
    }

    pub fn add(&mut self, projection: &Projection, key: FieldKey, arrays: Vec<Vec<f32>>) {
        self.size += estimated_size(&arrays);
        let (_, fields) = self
            .buckets
            .entry(projection.id)
            .or_insert_with(|| (projection.clone(), FieldBucket::new()));
        fields.entry(key).or_default().extend(arrays);
    }

    /// Empty the chunk, returning every projection's bucket.
    pub fn take(&mut self) -> Vec<(Projection, FieldBucket)> {
        self.size = 0;
        std::mem::take(&mut self.buckets).into_values().collect()
    }
}
