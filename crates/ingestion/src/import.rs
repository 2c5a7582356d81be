//! Manual import of GRIB files already on local disk.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{IngestionError, Result};
use crate::grib::{GribIngestor, IngestStats};
use crate::idx::{select_ranges, ByteRange};

/// `{file}.idx` next to `file`.
pub fn index_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".idx");
    PathBuf::from(name)
}

/// Copy `ranges` of `src` into `dst`, in order.
///
/// A range running past the end of `src` copies what is there.
pub fn copy_ranges<R, W>(src: &mut R, ranges: &[ByteRange], dst: &mut W) -> io::Result<u64>
where
    R: Read + Seek,
    W: Write,
{
    let mut copied = 0;
    for range in ranges {
        src.seek(SeekFrom::Start(range.start))?;
        copied += io::copy(&mut src.by_ref().take(range.length), dst)?;
    }
    dst.flush()?;
    Ok(copied)
}

/// Ingest local GRIB files for a source.
///
/// Each file's `.idx` sibling is reduced with the source's first
/// configured field as the selector, the selected ranges are copied into a
/// temp file, and that file is ingested.
pub async fn import_local(
    ingestor: &GribIngestor,
    source_name: &str,
    files: &[PathBuf],
) -> Result<Vec<IngestStats>> {
    let source = ingestor.source(source_name).await?;
    let fields = ingestor.catalog().source_fields(source.id).await?;
    let Some(first) = fields.first() else {
        return Err(IngestionError::NoFields(source_name.to_string()));
    };

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let index = tokio::fs::read_to_string(index_path(file)).await?;
        let ranges = select_ranges(&index, std::slice::from_ref(first));
        if ranges.is_empty() {
            warn!(file = %file.display(), "Index has no ranges for the first configured field");
        }
        let range_count = ranges.len();

        let src = file.clone();
        let (reduced, copied) = tokio::task::spawn_blocking(move || -> io::Result<_> {
            let mut reduced = tempfile::NamedTempFile::new()?;
            let copied = copy_ranges(&mut File::open(&src)?, &ranges, reduced.as_file_mut())?;
            Ok((reduced, copied))
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        info!(file = %file.display(), ranges = range_count, bytes = copied, "Reduced local file");

        results.push(ingestor.ingest_file(reduced.path(), &source).await?);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_index_path() {
        assert_eq!(
            index_path(Path::new("/data/hrrr.t12z.wrfsfcf01.grib2")),
            PathBuf::from("/data/hrrr.t12z.wrfsfcf01.grib2.idx")
        );
    }

    #[test]
    fn test_copy_ranges() {
        let mut src = Cursor::new((0..20u8).collect::<Vec<_>>());
        let mut dst = Vec::new();
        let ranges = [ByteRange::new(2, 3), ByteRange::new(10, 2), ByteRange::new(18, 10)];
        let copied = copy_ranges(&mut src, &ranges, &mut dst).unwrap();
        assert_eq!(copied, 7);
        assert_eq!(dst, vec![2, 3, 4, 10, 11, 18, 19]);
    }
}
