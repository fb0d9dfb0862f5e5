/// File I/O capability consumed by the pack reader and the asset cache.
///
/// Reads are positional (`offset` + buffer) so several background jobs can
/// stream from the same pack without sharing a cursor.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, RwLock};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};

/// Opaque handle returned by `FileIo::open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(u32);

impl FileHandle {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Positional file reader
pub trait FileIo: Send + Sync {
    /// Open a file by identifier (path for the filesystem backend)
    fn open(&self, path: &str) -> Result<FileHandle>;

    /// Read up to `buffer.len()` bytes at `offset`. Returns the number of bytes read,
    /// 0 at end of file.
    fn read(&self, handle: FileHandle, offset: u64, buffer: &mut [u8]) -> Result<usize>;

    /// Fill `buffer` completely from `offset`
    fn read_exact(&self, handle: FileHandle, offset: u64, buffer: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buffer.len() {
            let n = self.read(handle, offset + filled as u64, &mut buffer[filled..])?;
            if n == 0 {
                return Err(Error::Io(format!(
                    "unexpected end of file at offset {} ({} of {} bytes read)",
                    offset + filled as u64, filled, buffer.len()
                )));
            }
            filled += n;
        }
        Ok(())
    }
}

// ============================================================================
// Filesystem backend
// ============================================================================

/// `FileIo` over `std::fs`
///
/// Each open file keeps its own lock; reads on different files never contend.
#[derive(Default)]
pub struct StdFileIo {
    files: RwLock<Vec<Mutex<File>>>,
}

impl StdFileIo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileIo for StdFileIo {
    fn open(&self, path: &str) -> Result<FileHandle> {
        let file = File::open(path)
            .map_err(|e| Error::Io(format!("cannot open '{}': {}", path, e)))?;
        let mut files = self.files.write()
            .map_err(|_| Error::BackendError("StdFileIo lock poisoned".to_string()))?;
        files.push(Mutex::new(file));
        Ok(FileHandle((files.len() - 1) as u32))
    }

    fn read(&self, handle: FileHandle, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let files = self.files.read()
            .map_err(|_| Error::BackendError("StdFileIo lock poisoned".to_string()))?;
        let file = files.get(handle.0 as usize)
            .ok_or_else(|| Error::Io(format!("unknown file handle {}", handle.0)))?;
        let mut file = file.lock()
            .map_err(|_| Error::BackendError("StdFileIo file lock poisoned".to_string()))?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buffer)?)
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// `FileIo` over byte buffers registered by name
///
/// Used by tools that assemble packs in memory and by tests.
#[derive(Default)]
pub struct MemoryFileIo {
    files: RwLock<FxHashMap<String, Arc<[u8]>>>,
    handles: RwLock<Vec<Arc<[u8]>>>,
}

impl MemoryFileIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a file. Handles opened earlier keep the old contents.
    pub fn insert(&self, path: &str, bytes: Vec<u8>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.to_string(), bytes.into());
        }
    }
}

impl FileIo for MemoryFileIo {
    fn open(&self, path: &str) -> Result<FileHandle> {
        let bytes = self.files.read()
            .map_err(|_| Error::BackendError("MemoryFileIo lock poisoned".to_string()))?
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Io(format!("cannot open '{}': not found", path)))?;
        let mut handles = self.handles.write()
            .map_err(|_| Error::BackendError("MemoryFileIo lock poisoned".to_string()))?;
        handles.push(bytes);
        Ok(FileHandle((handles.len() - 1) as u32))
    }

    fn read(&self, handle: FileHandle, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        let handles = self.handles.read()
            .map_err(|_| Error::BackendError("MemoryFileIo lock poisoned".to_string()))?;
        let bytes = handles.get(handle.0 as usize)
            .ok_or_else(|| Error::Io(format!("unknown file handle {}", handle.0)))?;
        if offset >= bytes.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buffer.len().min(bytes.len() - start);
        buffer[..n].copy_from_slice(&bytes[start..start + n]);
        Ok(n)
    }
}

#[cfg(test)]
#[path = "file_io_tests.rs"]
mod tests;
