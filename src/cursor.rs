//! Batch cursors
//!
//! Position-addressable, re-seekable sources of (key, value) pairs used to
//! drive bulk ingestion. Cursors are independent of the engine's own
//! iterator types.

use crate::error::Result;
use crate::partition::xxhash32;

/// A restartable sequence of entries addressed by offset
pub trait BatchCursor {
    /// Sticky error state of the cursor
    fn status(&self) -> Result<()>;

    fn valid(&self) -> bool;

    /// Position of the current entry
    fn offset(&self) -> u32;

    /// Key of the current entry
    fn fid(&self) -> &[u8];

    /// Value of the current entry
    fn data(&self) -> &[u8];

    /// Position at `offset`; past-the-end leaves the cursor invalid
    fn seek(&mut self, offset: u32);

    fn next(&mut self);
}

/// Longest key `SyntheticBatch` generates (`xxxxxxxx-xxxxxxxx-xxxxxxxx`)
pub const SYNTHETIC_KEY_LEN: usize = 26;

/// Generates `total` entries on the fly.
///
/// The key at offset `i` is `"{h:08x}-{h:08x}-{h:08x}"` cut to the configured
/// key size, where `h` is `i` for ordered batches or the xxHash32 of `i`
/// otherwise. Every value is `value_size` bytes of `'x'`.
///
/// A new cursor is invalid until the first `seek`.
#[derive(Debug, Clone)]
pub struct SyntheticBatch {
    total: u32,
    key_size: usize,
    ordered: bool,
    value: Vec<u8>,
    offset: u32,
    key: String,
}

impl SyntheticBatch {
    pub fn new(total: u32, key_size: usize, value_size: usize, ordered: bool) -> Self {
        Self {
            total,
            key_size: key_size.min(SYNTHETIC_KEY_LEN),
            ordered,
            value: vec![b'x'; value_size],
            offset: total,
            key: String::with_capacity(SYNTHETIC_KEY_LEN),
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Key generated at `offset`, without moving the cursor
    pub fn key_at(&self, offset: u32) -> Vec<u8> {
        let mut key = String::with_capacity(SYNTHETIC_KEY_LEN);
        self.format_key(offset, &mut key);
        key.into_bytes()
    }

    fn format_key(&self, offset: u32, out: &mut String) {
        let h = if self.ordered {
            offset
        } else {
            xxhash32(&offset.to_le_bytes(), 0)
        };
        out.clear();
        out.push_str(&format!("{:08x}-{:08x}-{:08x}", h, h, h));
        out.truncate(self.key_size);
    }

    fn make_key(&mut self) {
        if self.valid() {
            let mut key = std::mem::take(&mut self.key);
            self.format_key(self.offset, &mut key);
            self.key = key;
        }
    }
}

impl BatchCursor for SyntheticBatch {
    fn status(&self) -> Result<()> {
        Ok(())
    }

    fn valid(&self) -> bool {
        self.offset < self.total
    }

    fn offset(&self) -> u32 {
        self.offset
    }

    fn fid(&self) -> &[u8] {
        self.key.as_bytes()
    }

    fn data(&self) -> &[u8] {
        &self.value
    }

    fn seek(&mut self, offset: u32) {
        self.offset = offset.min(self.total);
        self.make_key();
    }

    fn next(&mut self) {
        if self.valid() {
            self.offset += 1;
            self.make_key();
        }
    }
}
