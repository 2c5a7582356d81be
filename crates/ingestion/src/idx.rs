//! Byte-range selection from wgrib2-style `.idx` inventories.
//!
//! Each inventory line describes one GRIB field:
//!
//! ```text
//! 7:1234567:d=2024011512:TMP:2 m above ground:1 hour fcst:
//! ```
//!
//! The length of a field is the distance to the next record's offset, so
//! the last record of an inventory never yields a range.

use tracing::{debug, warn};
use wx_common::IndexSelector;

/// Fewer colon-separated tokens than this means the line is not a record.
const MIN_TOKENS: usize = 7;

/// A contiguous span of a remote GRIB file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Last byte of the range (HTTP ranges are inclusive).
    pub fn end_inclusive(&self) -> u64 {
        self.start + self.length.saturating_sub(1)
    }

    /// Value for a `Range` request header.
    pub fn http_range(&self) -> String {
        format!("bytes={}-{}", self.start, self.end_inclusive())
    }
}

/// Ranges of every record matching one of `selectors`, in inventory order.
///
/// A desired record's range is closed by the first following record with a
/// different offset. Records sharing an offset (NAM lists U and V wind at
/// the same offset) never produce a zero-length range: when both match,
/// the later one re-opens at the same start and they are fetched together.
pub fn select_ranges<S: AsRef<IndexSelector>>(index: &str, selectors: &[S]) -> Vec<ByteRange> {
    let mut ranges = Vec::new();
    let mut pending: Option<u64> = None;

    for line in index.lines() {
        let tokens: Vec<&str> = line.split(':').collect();
        if tokens.len() < MIN_TOKENS {
            continue;
        }

        let offset: u64 = match tokens[1].trim().parse() {
            Ok(offset) => offset,
            Err(_) => {
                debug!(line = %line, "Skipping index line with bad offset");
                continue;
            }
        };
        let (short_name, level) = (tokens[3], tokens[4]);

        if let Some(start) = pending {
            if offset != start {
                match offset.checked_sub(start) {
                    Some(length) => ranges.push(ByteRange::new(start, length)),
                    None => warn!(start, offset, "Index offsets go backwards, dropping range"),
                }
                pending = None;
            }
        }

        if selectors
            .iter()
            .any(|s| s.as_ref().matches(short_name, level))
        {
            pending = Some(offset);
        }
    }

    ranges
}
