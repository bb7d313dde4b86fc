//! Temporary directories and raw fixture files.

use std::path::{Path, PathBuf};

/// Creates a temporary directory for scratch files and test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Native-endian bytes of `values` converted to `i16` (rounded).
pub fn i16_bytes(values: &[f64]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|&v| (v.round() as i16).to_ne_bytes())
        .collect()
}

/// Native-endian bytes of `values` converted to `f32`.
pub fn f32_bytes(values: &[f64]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|&v| (v as f32).to_ne_bytes())
        .collect()
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_raw_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write raw test file");
    path
}
