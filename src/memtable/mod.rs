//! MemTable Module
//!
//! In-memory staging for one partition within one epoch.
//!
//! ## Responsibilities
//! - Accept appends without blocking or failing
//! - Track entry bytes for the partition's memory budget
//! - On finish, order entries by key and apply the dedup policy
//! - Expose the sealed entries through a bidirectional, seekable iterator
//!
//! ## Data Structure Choice
//! Keys and values are packed into one byte arena with a slot per entry.
//! Ordering happens once, at finish, with a stable sort: entries sharing a
//! key keep their insertion order. A buffer is sealed by value
//! (`WriteBuffer::finish` consumes it), so appending after finish cannot
//! compile.

mod buffer;
mod iterator;

pub use buffer::{SealedBuffer, WriteBuffer};
pub use iterator::BufferIter;

/// Ordering policy applied when a buffer is sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    /// Keep insertion order; the caller asserts keys arrive sorted
    pub skip_sort: bool,

    /// Merge entries sharing a key by concatenating their values
    pub unique_keys: bool,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            skip_sort: false,
            unique_keys: true,
        }
    }
}
