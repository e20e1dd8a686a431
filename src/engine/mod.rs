//! Engine Module
//!
//! The directory store: a writer that ingests epochs of appends and a
//! reader that reconstructs each key's history.
//!
//! ## Responsibilities
//! - Route appends to partitions and enforce the memory budget
//! - Seal buffers at epoch boundaries and when a partition fills up
//! - Compact sealed buffers into table fragments in the background
//! - Latch background failures and re-raise them on the next call
//! - Persist the fragment directory at finish
//! - Serve exact-key lookups across every epoch
//!
//! ## Writer Lifecycle
//! ```text
//!   open ──► append* ──► epoch_flush ──► append* ──► ... ──► finish
//!               │                                              │
//!               └── may block while the partition's previous   └── seals the current
//!                   buffer is still compacting                     epoch, waits for all
//!                                                                  compactions, writes
//!                                                                  DIRECTORY
//! ```
//!
//! ## Concurrency Model
//! - `append` takes a shared epoch lock, so appends to different
//!   partitions run in parallel; `epoch_flush` and `finish` take it
//!   exclusively
//! - Each partition holds at most two buffers: the active one and one
//!   compacting. A third seal waits on the partition's condition variable
//! - A partition's log is written by at most one compaction at a time, so
//!   fragments land in (epoch, seq) order

mod reader;
mod writer;

use std::path::Path;

use crate::config::DirOptions;
use crate::error::Result;

pub use reader::DirReader;
pub use writer::DirWriter;

/// Remove a store and every file in it
pub fn destroy_dir(path: &Path, options: &DirOptions) -> Result<()> {
    tracing::info!(path = %path.display(), "Destroying directory store");
    options.backend.remove_dir_all(path)
}
