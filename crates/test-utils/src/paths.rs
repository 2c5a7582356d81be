//! Temporary files for tests.

use std::io::Write;

/// Writes `bytes` to a fresh temporary file with the given suffix.
///
/// The file is removed when the returned handle is dropped.
pub fn write_temp_file(bytes: &[u8], suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temporary test file");
    file.write_all(bytes).expect("Failed to write temporary test file");
    file.flush().expect("Failed to flush temporary test file");
    file
}
