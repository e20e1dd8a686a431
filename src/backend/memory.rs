//! In-memory backend
//!
//! Files are shared byte vectors keyed by path. A writable handle and any
//! number of readers may point at the same file; readers see every byte
//! appended before the read.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{BurstError, Result};

use super::{Backend, RandomAccessFile, WritableFile};

type SharedBuf = Arc<RwLock<Vec<u8>>>;

#[derive(Debug, Default)]
struct MemFs {
    files: HashMap<PathBuf, SharedBuf>,
    dirs: HashSet<PathBuf>,
}

/// Backend keeping every file in memory
#[derive(Debug, Default, Clone)]
pub struct MemBackend {
    fs: Arc<Mutex<MemFs>>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored
    pub fn file_count(&self) -> usize {
        self.fs.lock().files.len()
    }

    /// Total bytes across all files
    pub fn total_bytes(&self) -> u64 {
        self.fs
            .lock()
            .files
            .values()
            .map(|buf| buf.read().len() as u64)
            .sum()
    }

    fn find(&self, path: &Path) -> Option<SharedBuf> {
        self.fs.lock().files.get(path).cloned()
    }
}

impl Backend for MemBackend {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut fs = self.fs.lock();
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                fs.dirs.insert(ancestor.to_path_buf());
            }
        }
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut fs = self.fs.lock();
        fs.files.retain(|p, _| !p.starts_with(path));
        fs.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let fs = self.fs.lock();
        fs.files.contains_key(path) || fs.dirs.contains(path)
    }

    fn new_writable(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let buf: SharedBuf = Arc::new(RwLock::new(Vec::new()));
        self.fs
            .lock()
            .files
            .insert(path.to_path_buf(), Arc::clone(&buf));
        Ok(Box::new(MemWritableFile { buf }))
    }

    fn new_random_access(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        match self.find(path) {
            Some(buf) => Ok(Arc::new(MemRandomAccessFile { buf })),
            None => Err(BurstError::NotFound(path.display().to_string())),
        }
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        match self.find(path) {
            Some(buf) => Ok(buf.read().len() as u64),
            None => Err(BurstError::NotFound(path.display().to_string())),
        }
    }
}

struct MemWritableFile {
    buf: SharedBuf,
}

impl WritableFile for MemWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.buf.write().extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MemRandomAccessFile {
    buf: SharedBuf,
}

impl RandomAccessFile for MemRandomAccessFile {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let buf = self.buf.read();
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= buf.len() => Ok(buf[start..end].to_vec()),
            _ => Err(BurstError::Corruption(format!(
                "short read: {} bytes at offset {} (file has {})",
                len,
                offset,
                buf.len()
            ))),
        }
    }

    fn size(&self) -> Result<u64> {
        Ok(self.buf.read().len() as u64)
    }
}
