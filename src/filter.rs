//! Bloom Filter
//!
//! Per-fragment membership filter built once while a fragment is written.
//!
//! ## Encoding
//! ```text
//! ┌──────────────────────────────┬──────────┐
//! │ bit array (ceil(n*b / 8) B)  │ k (1 B)  │
//! └──────────────────────────────┴──────────┘
//! ```
//! `k` probes are derived from one 32-bit hash by double hashing
//! (`h += delta` with `delta = rotl(h, 15)`). An empty encoding means "no
//! filter": every probe answers "maybe".
//!
//! False positives are possible, false negatives are not.

use crate::partition::xxhash32;

const FILTER_SEED: u32 = 0xbc9f_1d34;

/// Smallest bit array, so tiny fragments still get a useful filter
const MIN_BITS: usize = 64;

fn bloom_hash(key: &[u8]) -> u32 {
    xxhash32(key, FILTER_SEED)
}

/// Builds the filter of one fragment
#[derive(Debug)]
pub struct BloomBuilder {
    bits_per_key: usize,
    /// Number of probes (0 when disabled)
    k: u8,
    key_hashes: Vec<u32>,
}

impl BloomBuilder {
    /// `bits_per_key == 0` disables the filter
    pub fn new(bits_per_key: usize) -> Self {
        // k = ln(2) * bits_per_key minimizes the false positive rate
        let k = if bits_per_key == 0 {
            0
        } else {
            ((bits_per_key as f64) * 0.69).round().clamp(1.0, 30.0) as u8
        };
        Self {
            bits_per_key,
            k,
            key_hashes: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bits_per_key > 0
    }

    /// Record a key for the fragment under construction
    pub fn add(&mut self, key: &[u8]) {
        if self.is_enabled() {
            self.key_hashes.push(bloom_hash(key));
        }
    }

    pub fn num_keys(&self) -> usize {
        self.key_hashes.len()
    }

    /// Emit the filter and reset the builder for the next fragment
    pub fn finish(&mut self) -> Vec<u8> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let bits = (self.key_hashes.len() * self.bits_per_key).max(MIN_BITS);
        let bytes = bits.div_ceil(8);
        let bits = bytes * 8;

        let mut filter = vec![0u8; bytes + 1];
        for &hash in &self.key_hashes {
            let mut h = hash;
            let delta = h.rotate_left(15);
            for _ in 0..self.k {
                let bit = (h as usize) % bits;
                filter[bit / 8] |= 1 << (bit % 8);
                h = h.wrapping_add(delta);
            }
        }
        filter[bytes] = self.k;

        self.key_hashes.clear();
        filter
    }
}

/// Probe a filter produced by `BloomBuilder::finish`.
///
/// Returns `false` only when `key` was definitely never added.
pub fn bloom_may_match(key: &[u8], filter: &[u8]) -> bool {
    if filter.len() < 2 {
        return true;
    }

    let bytes = filter.len() - 1;
    let bits = bytes * 8;
    let k = filter[bytes];
    if k == 0 || k > 30 {
        // Unknown encoding: treat as a match
        return true;
    }

    let mut h = bloom_hash(key);
    let delta = h.rotate_left(15);
    for _ in 0..k {
        let bit = (h as usize) % bits;
        if filter[bit / 8] & (1 << (bit % 8)) == 0 {
            return false;
        }
        h = h.wrapping_add(delta);
    }
    true
}
