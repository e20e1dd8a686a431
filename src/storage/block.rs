//! Block builder and reader
//!
//! Prefix-compressed sorted entries with a restart-offset index for
//! in-block binary search.

use std::cmp::Ordering;

use crate::error::{BurstError, Result};

use super::RESTART_INTERVAL;

const ENTRY_HEADER_SIZE: usize = 12;

fn get_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn shared_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

// =============================================================================
// Builder
// =============================================================================

/// Accumulates entries (added in key order) into one block payload
#[derive(Debug)]
pub struct BlockBuilder {
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    entry_count: usize,
    last_key: Vec<u8>,
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            restarts: Vec::new(),
            counter: 0,
            entry_count: 0,
            last_key: Vec::new(),
        }
    }

    /// Pre-size the entry area
    pub fn with_capacity(bytes: usize) -> Self {
        let mut builder = Self::new();
        builder.buffer.reserve(bytes);
        builder
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        let shared = if self.counter % RESTART_INTERVAL == 0 {
            self.restarts.push(self.buffer.len() as u32);
            0
        } else {
            shared_prefix_len(&self.last_key, key)
        };
        let unshared = key.len() - shared;

        self.buffer.extend_from_slice(&(shared as u32).to_le_bytes());
        self.buffer.extend_from_slice(&(unshared as u32).to_le_bytes());
        self.buffer.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        self.entry_count += 1;
    }

    /// Size of the payload `finish` would return now
    pub fn size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Key of the most recent entry
    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }

    /// Seal the payload and reset the builder for the next block
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buffer);
        for restart in &self.restarts {
            out.extend_from_slice(&restart.to_le_bytes());
        }
        out.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());

        self.restarts.clear();
        self.counter = 0;
        self.entry_count = 0;
        out
    }
}

// =============================================================================
// Reader
// =============================================================================

/// A decoded block payload
#[derive(Debug, Clone)]
pub struct Block {
    data: Vec<u8>,
    /// Start of the restart array (end of the entry area)
    restart_offset: usize,
    num_restarts: usize,
}

impl Block {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() < 4 {
            return Err(BurstError::Corruption(format!(
                "block too short: {} bytes",
                data.len()
            )));
        }
        let num_restarts = get_u32(&data, data.len() - 4) as usize;
        let restart_bytes = num_restarts
            .checked_mul(4)
            .and_then(|n| n.checked_add(4))
            .filter(|&n| n <= data.len())
            .ok_or_else(|| {
                BurstError::Corruption(format!(
                    "bad restart count {} for {}-byte block",
                    num_restarts,
                    data.len()
                ))
            })?;
        let restart_offset = data.len() - restart_bytes;
        Ok(Self {
            data,
            restart_offset,
            num_restarts,
        })
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn iter(&self) -> BlockIter<'_> {
        BlockIter {
            block: self,
            current: self.restart_offset,
            next: self.restart_offset,
            key: Vec::new(),
            value: (0, 0),
        }
    }

    fn restart_point(&self, index: usize) -> usize {
        get_u32(&self.data, self.restart_offset + index * 4) as usize
    }
}

/// Forward cursor over a block's entries
pub struct BlockIter<'a> {
    block: &'a Block,
    /// Offset of the current entry; `restart_offset` when not valid
    current: usize,
    /// Offset of the entry after the current one
    next: usize,
    key: Vec<u8>,
    value: (usize, usize),
}

impl<'a> BlockIter<'a> {
    pub fn valid(&self) -> bool {
        self.current < self.block.restart_offset
    }

    /// REQUIRES: `valid()`
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// REQUIRES: `valid()`
    pub fn value(&self) -> &'a [u8] {
        &self.block.data[self.value.0..self.value.1]
    }

    pub fn seek_to_first(&mut self) -> Result<()> {
        if self.block.num_restarts == 0 {
            self.current = self.block.restart_offset;
            return Ok(());
        }
        self.key.clear();
        self.parse_at(self.block.restart_point(0))
    }

    /// REQUIRES: `valid()`
    pub fn next(&mut self) -> Result<()> {
        debug_assert!(self.valid());
        self.parse_at(self.next)
    }

    /// Position at the first entry whose key is `>= target`
    pub fn seek(&mut self, target: &[u8]) -> Result<()> {
        // First restart whose key is >= target; scanning starts one before
        // it so a run of equal keys is entered at its first entry.
        let (mut left, mut right) = (0, self.block.num_restarts);
        while left < right {
            let mid = left + (right - left) / 2;
            let key = self.restart_key(mid)?;
            match key.cmp(target) {
                Ordering::Less => left = mid + 1,
                _ => right = mid,
            }
        }

        if self.block.num_restarts == 0 {
            self.current = self.block.restart_offset;
            return Ok(());
        }
        self.key.clear();
        self.parse_at(self.block.restart_point(left.saturating_sub(1)))?;
        while self.valid() && self.key.as_slice() < target {
            self.next()?;
        }
        Ok(())
    }

    fn restart_key(&self, index: usize) -> Result<&'a [u8]> {
        let data = &self.block.data;
        let pos = self.block.restart_point(index);
        let (shared, unshared, value_len) = self.header_at(pos)?;
        if shared != 0 {
            return Err(BurstError::Corruption(
                "restart entry has a shared prefix".to_string(),
            ));
        }
        let start = pos + ENTRY_HEADER_SIZE;
        self.check_bounds(start, unshared + value_len)?;
        Ok(&data[start..start + unshared])
    }

    fn header_at(&self, pos: usize) -> Result<(usize, usize, usize)> {
        self.check_bounds(pos, ENTRY_HEADER_SIZE)?;
        let data = &self.block.data;
        Ok((
            get_u32(data, pos) as usize,
            get_u32(data, pos + 4) as usize,
            get_u32(data, pos + 8) as usize,
        ))
    }

    fn check_bounds(&self, pos: usize, len: usize) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.block.restart_offset => Ok(()),
            _ => Err(BurstError::Corruption(format!(
                "block entry out of bounds at offset {}",
                pos
            ))),
        }
    }

    /// Decode the entry at `pos`, building on the current key
    fn parse_at(&mut self, pos: usize) -> Result<()> {
        if pos >= self.block.restart_offset {
            self.current = self.block.restart_offset;
            return Ok(());
        }
        let (shared, unshared, value_len) = self.header_at(pos)?;
        if shared > self.key.len() {
            return Err(BurstError::Corruption(format!(
                "shared prefix {} exceeds previous key length {}",
                shared,
                self.key.len()
            )));
        }
        let start = pos + ENTRY_HEADER_SIZE;
        self.check_bounds(start, unshared + value_len)?;

        self.key.truncate(shared);
        self.key
            .extend_from_slice(&self.block.data[start..start + unshared]);
        self.value = (start + unshared, start + unshared + value_len);
        self.current = pos;
        self.next = start + unshared + value_len;
        Ok(())
    }
}
