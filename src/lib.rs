//! # burstkv
//!
//! A write-optimized, partitioned, epoch-versioned key/value log store for
//! bursty small-record ingestion, with:
//! - Hash partitioning across independent shards
//! - Epoch-boundary flushing and background compaction
//! - Block-structured tables with bloom filters, snappy and checksums
//! - Exact-key lookups that return a key's full history across epochs
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        DirWriter                            │
//! │          append(key, value, epoch) / epoch_flush / finish   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Partitioner (xxHash32 & mask)
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │ WriteBuffer │ │ WriteBuffer │ │ WriteBuffer │  (per partition,
//!   │   part 0    │ │   part 1    │ │   part N    │   double-buffered)
//!   └──────┬──────┘ └──────┬──────┘ └──────┬──────┘
//!          │ seal          │               │
//!          ▼               ▼               ▼
//!   ┌────────────────────────────────────────────────┐
//!   │  CompactionScheduler (inline / pool / threads) │
//!   │  FragmentBuilder: blocks + bloom + index       │
//!   └──────┬─────────────────────────────────────────┘
//!          ▼
//!   part-NNNN.dat / part-NNNN.idx / DIRECTORY   ◄── DirReader::read_all
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod backend;
pub mod memtable;
pub mod partition;
pub mod filter;
pub mod storage;
pub mod compaction;
pub mod engine;
pub mod metrics;
pub mod cursor;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BurstError, Result};
pub use config::{Compression, DirOptions, DirOptionsBuilder};
pub use backend::{Backend, LocalBackend, MemBackend, ThrottledBackend};
pub use compaction::ThreadPool;
pub use cursor::{BatchCursor, SyntheticBatch};
pub use engine::{destroy_dir, DirReader, DirWriter};
pub use metrics::{Histogram, IoStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of burstkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
