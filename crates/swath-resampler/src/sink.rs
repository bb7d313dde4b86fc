//! Destinations for finished output lines.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ResampleError, Result};
use crate::grid::GridMetadata;
use crate::types::TypedBuffer;

/// Receives the output image one line at a time, top to bottom.
pub trait OutputSink {
    /// Write line `line` as native-endian bytes of the output type.
    fn write_line(&mut self, line: usize, bytes: &[u8]) -> Result<()>;

    /// Called once after the last line.
    fn finish(&mut self, metadata: &GridMetadata) -> Result<()>;
}

fn check_order(expected: usize, line: usize) -> Result<()> {
    if line != expected {
        return Err(ResampleError::sink(format!(
            "line {line} written out of order, expected line {expected}"
        )));
    }
    Ok(())
}

/// Collects output lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Vec<Vec<u8>>,
    metadata: Option<GridMetadata>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[Vec<u8>] {
        &self.lines
    }

    /// Metadata passed to [`OutputSink::finish`], once finished.
    pub fn metadata(&self) -> Option<&GridMetadata> {
        self.metadata.as_ref()
    }

    /// The whole image as `f64`, row-major. Requires a finished sink.
    pub fn values(&self) -> Result<Vec<f64>> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| ResampleError::sink("sink has not been finished"))?;
        let bytes = self.lines.concat();
        Ok(TypedBuffer::from_bytes(metadata.storage_type, &bytes)?.to_f64_vec())
    }
}

impl OutputSink for MemorySink {
    fn write_line(&mut self, line: usize, bytes: &[u8]) -> Result<()> {
        check_order(self.lines.len(), line)?;
        self.lines.push(bytes.to_vec());
        Ok(())
    }

    fn finish(&mut self, metadata: &GridMetadata) -> Result<()> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }
}

/// Writes the image as a headerless raw file plus a JSON sidecar
/// (`<path>.json`) describing the grid.
#[derive(Debug)]
pub struct RawFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    next_line: usize,
    bytes_written: u64,
}

impl RawFileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| ResampleError::sink(format!("create {}: {e}", path.display())))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            next_line: 0,
            bytes_written: 0,
        })
    }

    /// Sidecar path for a raw output file.
    pub fn header_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl OutputSink for RawFileSink {
    fn write_line(&mut self, line: usize, bytes: &[u8]) -> Result<()> {
        check_order(self.next_line, line)?;
        self.writer
            .write_all(bytes)
            .map_err(|e| ResampleError::sink(format!("write line {line}: {e}")))?;
        self.next_line += 1;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn finish(&mut self, metadata: &GridMetadata) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| ResampleError::sink(format!("flush {}: {e}", self.path.display())))?;

        let header_path = Self::header_path(&self.path);
        let header = File::create(&header_path)
            .map_err(|e| ResampleError::sink(format!("create {}: {e}", header_path.display())))?;
        serde_json::to_writer_pretty(BufWriter::new(header), metadata)
            .map_err(|e| ResampleError::sink(format!("write {}: {e}", header_path.display())))?;

        info!(
            path = %self.path.display(),
            lines = self.next_line,
            bytes = self.bytes_written,
            "Wrote output image"
        );
        Ok(())
    }
}
