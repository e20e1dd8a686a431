//! Partitioner
//!
//! Maps a key to one of `2^lg_parts` shards. The mapping is a pure function of
//! the key bytes (xxHash32, seed 0) so a reader opened later, given the
//! persisted `lg_parts`, routes every key to the shard that wrote it.

use std::hash::Hasher;

use twox_hash::XxHash32;

/// xxHash32 of `data` with `seed`
pub fn xxhash32(data: &[u8], seed: u32) -> u32 {
    let mut hasher = XxHash32::with_seed(seed);
    hasher.write(data);
    hasher.finish() as u32
}

/// Deterministic key → partition mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    lg_parts: u32,
    mask: u32,
}

impl Partitioner {
    pub fn new(lg_parts: u32) -> Self {
        Self {
            lg_parts,
            mask: (1u32 << lg_parts) - 1,
        }
    }

    pub fn lg_parts(&self) -> u32 {
        self.lg_parts
    }

    pub fn num_parts(&self) -> usize {
        1usize << self.lg_parts
    }

    /// Shard owning `key`
    pub fn partition_of(&self, key: &[u8]) -> usize {
        (xxhash32(key, 0) & self.mask) as usize
    }
}
