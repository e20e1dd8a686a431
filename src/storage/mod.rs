//! Storage Module
//!
//! Persistent, append-only layout of a directory store.
//!
//! ## Responsibilities
//! - Encode sorted entries into checksummed, optionally compressed blocks
//! - Batch sealed blocks into large writes against slow storage
//! - Write one filter + block index per table fragment
//! - Look up a key inside a fragment
//! - Persist the fragment directory that readers open
//!
//! ## Directory Layout
//! ```text
//! {dir}/
//!   ├── part-0000.dat    (data log: batched blocks of partition 0)
//!   ├── part-0000.idx    (index log: filter + block index per fragment)
//!   ├── ...
//!   └── DIRECTORY        (fragment directory, written at finish)
//! ```
//!
//! ## Stored Block
//! ```text
//! ┌──────────────────────────┬──────────┬─────────────┐
//! │ payload (raw or snappy)  │ type (1) │ crc32 (4)   │
//! └──────────────────────────┴──────────┴─────────────┘
//! ```
//!
//! ## Block Payload (uncompressed)
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Entry: [shared u32][unshared u32][value_len u32][key][value]│
//! │ ... (restart point every 16 entries: shared = 0) ...        │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Restart offsets: u32 * n | n: u32                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//! Index blocks reuse this format: key = last key of a data block,
//! value = block handle (offset u64, size u64).

mod block;
mod builder;
mod directory;
mod format;
mod reader;
mod sink;

pub use block::{Block, BlockBuilder, BlockIter};
pub use builder::{FragmentBuilder, FragmentSizes};
pub use directory::{Directory, FragmentMeta};
pub use format::{read_block, write_block, BlockHandle, BlockType};
pub use reader::FragmentIndex;
pub use sink::{LogSink, Stream};

// =============================================================================
// Shared Constants
// =============================================================================

/// Entries between restart points inside a block
pub(crate) const RESTART_INTERVAL: usize = 16;

/// Type byte + crc32 after every stored block
pub(crate) const BLOCK_TRAILER_SIZE: usize = 5;

/// Name of the fragment directory file
pub const DIRECTORY_FILE: &str = "DIRECTORY";

/// Data log file name of a partition
pub fn data_log_name(part: usize) -> String {
    format!("part-{:04}.dat", part)
}

/// Index log file name of a partition
pub fn index_log_name(part: usize) -> String {
    format!("part-{:04}.idx", part)
}
