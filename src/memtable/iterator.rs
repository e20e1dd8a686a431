//! Sealed buffer iterator
//!
//! Bidirectional cursor over a `SealedBuffer`.

use super::SealedBuffer;

/// Cursor over sealed entries in key order.
///
/// A fresh cursor is not positioned; call one of the seek methods first.
pub struct BufferIter<'a> {
    buffer: &'a SealedBuffer,
    /// `num_entries()` means "not valid"
    pos: usize,
}

impl<'a> BufferIter<'a> {
    pub(super) fn new(buffer: &'a SealedBuffer) -> Self {
        Self {
            buffer,
            pos: buffer.num_entries(),
        }
    }

    pub fn valid(&self) -> bool {
        self.pos < self.buffer.num_entries()
    }

    pub fn seek_to_first(&mut self) {
        self.pos = 0;
    }

    pub fn seek_to_last(&mut self) {
        let n = self.buffer.num_entries();
        self.pos = if n == 0 { 0 } else { n - 1 };
    }

    /// Position at the first entry whose key is `>= target`
    pub fn seek(&mut self, target: &[u8]) {
        let (mut lo, mut hi) = (0, self.buffer.num_entries());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.buffer.key_at(mid) < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.pos = lo;
    }

    /// REQUIRES: `valid()`
    pub fn next(&mut self) {
        debug_assert!(self.valid());
        self.pos += 1;
    }

    /// REQUIRES: `valid()`. Stepping back from the first entry invalidates.
    pub fn prev(&mut self) {
        debug_assert!(self.valid());
        if self.pos == 0 {
            self.pos = self.buffer.num_entries();
        } else {
            self.pos -= 1;
        }
    }

    /// REQUIRES: `valid()`
    pub fn key(&self) -> &'a [u8] {
        self.buffer.key_at(self.pos)
    }

    /// REQUIRES: `valid()`
    pub fn value(&self) -> &'a [u8] {
        self.buffer.value_at(self.pos)
    }
}
