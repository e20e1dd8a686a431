//! Backend Module
//!
//! The byte-stream storage the engine reads and writes through.
//!
//! ## Capability Set
//! - create / remove a directory
//! - create an append-only file (truncating any previous content)
//! - open a file for positional reads
//! - query a file's size
//!
//! ## Variants
//! - `LocalBackend`: the real filesystem
//! - `MemBackend`: in-memory files, for tests and read benchmarks
//! - `ThrottledBackend`: wraps another backend, emulates a slow link and
//!   records the time between successive writes of each file

mod local;
mod memory;
mod throttled;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

pub use local::LocalBackend;
pub use memory::MemBackend;
pub use throttled::ThrottledBackend;

/// An append-only output file
pub trait WritableFile: Send {
    /// Append bytes at the end of the file
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Push buffered bytes down to the backend
    fn flush(&mut self) -> Result<()>;

    /// Make appended bytes durable
    fn sync(&mut self) -> Result<()>;
}

/// A file supporting positional reads from many threads
pub trait RandomAccessFile: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// A read past the end of the file is an error.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Current size in bytes
    fn size(&self) -> Result<u64>;
}

/// Storage capability set injected through `DirOptions::backend`
pub trait Backend: Send + Sync + fmt::Debug {
    /// Create a directory and any missing parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it (missing is not an error)
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Whether a file or directory exists
    fn exists(&self, path: &Path) -> bool;

    /// Create (or truncate) a file for appending
    fn new_writable(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    /// Open an existing file for reading
    fn new_random_access(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>>;

    /// Size of an existing file
    fn file_size(&self, path: &Path) -> Result<u64>;
}
