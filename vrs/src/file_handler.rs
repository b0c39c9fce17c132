//! FileHandler capability (C1): storage backend abstraction for reads and
//! writes, local-disk implementation plus the trait boundary for remote
//! backends (spec.md §1 Non-goals: pluggable remote backends are out of
//! scope beyond this trait).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VrsError};

/// Abstraction over a single open chunk/file used by the writer and reader.
/// Grounded in `original_source/vrs/DiskFile.h`/`WriteFileHandler.h`: a thin
/// seek+read/write surface, with a capability flag for whether the backend
/// supports reopening an already-closed file for in-place patching (used by
/// index auto-fix-up, spec.md §4.6).
pub trait FileHandler: Send {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;
    fn append(&mut self, buf: &[u8]) -> Result<u64>;
    fn size(&mut self) -> Result<u64>;
    fn flush(&mut self) -> Result<()>;

    /// Whether this backend supports reopening a finalized file to patch
    /// bytes in place (local disk: yes; remote/append-only stores: no).
    fn supports_reopen_for_updates(&self) -> bool {
        false
    }

    /// Hint that the given byte ranges will be read soon. Backends may
    /// ignore this entirely (spec.md §4.9 `prefetchRecordSequence`).
    fn prefetch(&mut self, _ranges: &[(u64, u64)]) {}
}

/// Local-disk FileHandler: the only backend this crate ships (spec.md §1
/// Non-goals exclude pluggable remote backends beyond the trait boundary).
pub struct DiskFileHandler {
    file: File,
    path: PathBuf,
}

impl DiskFileHandler {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(VrsError::Io)?;
        Ok(DiskFileHandler { file, path })
    }

    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).open(&path).map_err(VrsError::Io)?;
        Ok(DiskFileHandler { file, path })
    }

    pub fn open_read_write(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path).map_err(VrsError::Io)?;
        Ok(DiskFileHandler { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandler for DiskFileHandler {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset)).map_err(VrsError::Io)?;
        self.file.read_exact(buf).map_err(|_| VrsError::UnexpectedEof { offset })
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset)).map_err(VrsError::Io)?;
        self.file.write_all(buf).map_err(VrsError::Io)
    }

    fn append(&mut self, buf: &[u8]) -> Result<u64> {
        let offset = self.file.seek(SeekFrom::End(0)).map_err(VrsError::Io)?;
        self.file.write_all(buf).map_err(VrsError::Io)?;
        Ok(offset)
    }

    fn size(&mut self) -> Result<u64> {
        self.file.seek(SeekFrom::End(0)).map_err(VrsError::Io)
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(VrsError::Io)
    }

    fn supports_reopen_for_updates(&self) -> bool {
        true
    }
}

/// Handler invoked by the writer when a chunk is finalized (spec.md §4.8
/// `NewChunkHandler`).
pub trait NewChunkHandler: Send {
    fn on_new_chunk(&mut self, chunk_path: &Path, chunk_index: usize, is_last_chunk: bool);
}

/// A `NewChunkHandler` that does nothing; the default for single-chunk files.
pub struct NoopChunkHandler;

impl NewChunkHandler for NoopChunkHandler {
    fn on_new_chunk(&mut self, _chunk_path: &Path, _chunk_index: usize, _is_last_chunk: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.bin");
        {
            let mut handler = DiskFileHandler::create(&path).unwrap();
            handler.append(b"hello").unwrap();
            handler.append(b"world").unwrap();
            handler.flush().unwrap();
        }
        let mut handler = DiskFileHandler::open_read(&path).unwrap();
        let mut buf = [0u8; 10];
        handler.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"helloworld");
    }

    #[test]
    fn write_at_patches_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.bin");
        let mut handler = DiskFileHandler::create(&path).unwrap();
        handler.append(&[0u8; 8]).unwrap();
        handler.write_at(2, &[1, 2, 3]).unwrap();
        let mut buf = [0u8; 8];
        handler.read_at(0, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 1, 2, 3, 0, 0, 0]);
    }
}
