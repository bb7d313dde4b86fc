//! Append-only scratch file holding evicted tiles.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::config::RunContext;
use crate::error::{ResampleError, Result};

/// Scratch file created in the run's scratch directory.
///
/// Payloads are appended back to back and addressed by their starting
/// byte offset. The file is removed when dropped unless the run context
/// asked to keep it.
#[derive(Debug)]
pub(crate) struct ScratchFile {
    file: NamedTempFile,
    end: u64,
}

impl ScratchFile {
    pub(crate) fn create(ctx: &RunContext) -> Result<Self> {
        let prefix = format!("{}{}-", ctx.scratch_prefix, ctx.run_id);
        let file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tiles")
            .keep(ctx.keep_scratch)
            .tempfile_in(&ctx.scratch_dir)
            .map_err(|e| ResampleError::scratch_io("create", e))?;
        Ok(Self { file, end: 0 })
    }

    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }

    /// Bytes written so far.
    pub(crate) fn len(&self) -> u64 {
        self.end
    }

    /// Append `payload` and return its offset.
    pub(crate) fn append(&mut self, payload: &[u8]) -> Result<u64> {
        let offset = self.end;
        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ResampleError::scratch_io("seek", e))?;
        file.write_all(payload)
            .map_err(|e| ResampleError::scratch_io("write", e))?;
        self.end += payload.len() as u64;
        Ok(offset)
    }

    /// Read `len` bytes written at `offset`.
    pub(crate) fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset + len as u64 > self.end {
            return Err(ResampleError::scratch_io(
                "read",
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("payload at {offset}+{len} is past end of scratch ({})", self.end),
                ),
            ));
        }
        let file = self.file.as_file_mut();
        file.flush().map_err(|e| ResampleError::scratch_io("flush", e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ResampleError::scratch_io("seek", e))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .map_err(|e| ResampleError::scratch_io("read", e))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(dir.path());
        let mut scratch = ScratchFile::create(&ctx).unwrap();

        let a = scratch.append(&[1, 2, 3]).unwrap();
        let b = scratch.append(&[9, 8]).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 3);
        assert_eq!(scratch.len(), 5);

        assert_eq!(scratch.read_at(b, 2).unwrap(), vec![9, 8]);
        assert_eq!(scratch.read_at(a, 3).unwrap(), vec![1, 2, 3]);
        assert!(scratch.read_at(4, 2).is_err());
    }

    #[test]
    fn test_scratch_named_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(dir.path());
        let scratch = ScratchFile::create(&ctx).unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("swath-tiles-"));
        assert!(name.contains(&ctx.run_id));
        assert!(scratch.path().starts_with(dir.path()));
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new(dir.path());
        let path = {
            let scratch = ScratchFile::create(&ctx).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_scratch_kept_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = RunContext::new(dir.path());
        ctx.keep_scratch = true;
        let path = {
            let scratch = ScratchFile::create(&ctx).unwrap();
            scratch.path().to_path_buf()
        };
        assert!(path.exists());
    }
}
