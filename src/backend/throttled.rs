//! Rate-limited, instrumented backend
//!
//! Emulates a slow storage link: every append sleeps for
//! `len / bytes_per_sec` seconds. The gap between successive non-empty
//! appends of each file is recorded in a per-file `Histogram` (microseconds).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::Result;
use crate::metrics::Histogram;

use super::{Backend, RandomAccessFile, WritableFile};

type SharedHist = Arc<Mutex<Histogram>>;

/// Wraps a backend and throttles its writes
#[derive(Debug)]
pub struct ThrottledBackend {
    inner: Arc<dyn Backend>,
    bytes_per_sec: u64,
    hists: Mutex<BTreeMap<PathBuf, SharedHist>>,
}

impl ThrottledBackend {
    /// `bytes_per_sec == 0` disables the delay but keeps the histograms
    pub fn new(inner: Arc<dyn Backend>, bytes_per_sec: u64) -> Self {
        Self {
            inner,
            bytes_per_sec,
            hists: Mutex::new(BTreeMap::new()),
        }
    }

    /// Merged write-gap histogram of every file whose name ends with `suffix`
    pub fn histogram(&self, suffix: &str) -> Option<Histogram> {
        let hists = self.hists.lock();
        let mut merged: Option<Histogram> = None;
        for (path, hist) in hists.iter() {
            if path.to_string_lossy().ends_with(suffix) {
                merged
                    .get_or_insert_with(Histogram::new)
                    .merge(&hist.lock());
            }
        }
        merged
    }
}

impl Backend for ThrottledBackend {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.create_dir_all(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.remove_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn new_writable(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        let inner = self.inner.new_writable(path)?;
        let hist: SharedHist = Arc::new(Mutex::new(Histogram::new()));
        self.hists
            .lock()
            .insert(path.to_path_buf(), Arc::clone(&hist));
        Ok(Box::new(ThrottledWritableFile {
            inner,
            bytes_per_sec: self.bytes_per_sec,
            prev_write: None,
            hist,
        }))
    }

    fn new_random_access(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        self.inner.new_random_access(path)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        self.inner.file_size(path)
    }
}

struct ThrottledWritableFile {
    inner: Box<dyn WritableFile>,
    bytes_per_sec: u64,
    prev_write: Option<Instant>,
    hist: SharedHist,
}

impl WritableFile for ThrottledWritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        if !data.is_empty() {
            let now = Instant::now();
            if let Some(prev) = self.prev_write {
                self.hist
                    .lock()
                    .add(now.duration_since(prev).as_micros() as f64);
            }
            self.prev_write = Some(now);
            if self.bytes_per_sec > 0 {
                let micros = 1_000_000u64 * data.len() as u64 / self.bytes_per_sec;
                thread::sleep(Duration::from_micros(micros));
            }
        }
        self.inner.append(data)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.sync()
    }
}
