//! Configuration for burstkv
//!
//! Centralized directory options with sensible defaults.

use std::sync::Arc;

use crate::backend::{Backend, LocalBackend};
use crate::compaction::ThreadPool;
use crate::error::{BurstError, Result};

/// Largest supported `lg_parts` (4096 partitions)
pub const MAX_LG_PARTS: u32 = 12;

/// Block compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Store blocks raw
    None,

    /// Snappy-compress blocks when it pays off (or always, if forced)
    Snappy,
}

/// Options shared by `DirWriter` and `DirReader`
#[derive(Debug, Clone)]
pub struct DirOptions {
    // -------------------------------------------------------------------------
    // Memory Configuration
    // -------------------------------------------------------------------------
    /// Aggregate memory ceiling across all partitions' write buffers (bytes).
    /// Each partition is double-buffered, so the active buffer of one partition
    /// seals at `total_memtable_budget / (2 << lg_parts)` bytes.
    pub total_memtable_budget: usize,

    /// log2 of the partition count; persisted in the directory file
    pub lg_parts: u32,

    // -------------------------------------------------------------------------
    // Table Format Configuration
    // -------------------------------------------------------------------------
    /// Target block size in bytes
    pub block_size: usize,

    /// Fill ratio of `block_size` at which a block is sealed
    pub block_util: f64,

    /// Bytes of sealed blocks accumulated before one physical write
    pub block_batch_size: usize,

    /// Bloom filter bits per key (0 disables filters)
    pub bf_bits_per_key: usize,

    /// Block compression codec
    pub compression: Compression,

    /// Keep compressed output even when it does not save space
    pub force_compression: bool,

    // -------------------------------------------------------------------------
    // Ordering Configuration
    // -------------------------------------------------------------------------
    /// Merge same-key entries of one buffer into a single entry
    pub unique_keys: bool,

    /// Trust the caller's key order instead of sorting at buffer finish
    pub skip_sort: bool,

    // -------------------------------------------------------------------------
    // Integrity Configuration
    // -------------------------------------------------------------------------
    /// Verify block checksums on read
    pub verify_checksums: bool,

    /// Extra write-time checks (key order, codec round trip)
    pub paranoid_checks: bool,

    // -------------------------------------------------------------------------
    // Scheduling Configuration
    // -------------------------------------------------------------------------
    /// Shared pool for background compactions
    pub compaction_pool: Option<Arc<ThreadPool>>,

    /// Spawn a thread per compaction when no pool is set.
    /// With neither, compactions run on the caller's thread.
    pub allow_env_threads: bool,

    // -------------------------------------------------------------------------
    // Sizing Hints
    // -------------------------------------------------------------------------
    /// Nominal key size (pre-allocation hint only)
    pub key_size: usize,

    /// Nominal value size (pre-allocation hint only)
    pub value_size: usize,

    /// Write buffering for each partition's data log (bytes)
    pub data_buffer: usize,

    /// Write buffering for each partition's index log (bytes)
    pub index_buffer: usize,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Storage backend every file goes through
    pub backend: Arc<dyn Backend>,
}

impl Default for DirOptions {
    fn default() -> Self {
        Self {
            total_memtable_budget: 4 * 1024 * 1024, // 4 MB
            lg_parts: 0,
            block_size: 128 * 1024, // 128 KB
            block_util: 0.996,
            block_batch_size: 2 * 1024 * 1024, // 2 MB
            bf_bits_per_key: 8,
            compression: Compression::None,
            force_compression: false,
            unique_keys: true,
            skip_sort: false,
            verify_checksums: false,
            paranoid_checks: false,
            compaction_pool: None,
            allow_env_threads: true,
            key_size: 8,
            value_size: 32,
            data_buffer: 4 * 1024 * 1024,  // 4 MB
            index_buffer: 1024 * 1024,     // 1 MB
            backend: Arc::new(LocalBackend::new()),
        }
    }
}

impl DirOptions {
    /// Create a new options builder
    pub fn builder() -> DirOptionsBuilder {
        DirOptionsBuilder::default()
    }

    /// Number of partitions (`2^lg_parts`)
    pub fn num_parts(&self) -> usize {
        1usize << self.lg_parts
    }

    /// Byte size at which one partition's active buffer is sealed
    pub fn partition_buffer_budget(&self) -> usize {
        self.total_memtable_budget / (2 * self.num_parts())
    }

    /// Byte size at which a data block is sealed
    pub fn block_threshold(&self) -> usize {
        ((self.block_size as f64) * self.block_util).max(1.0) as usize
    }

    /// Reject option combinations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.lg_parts > MAX_LG_PARTS {
            return Err(BurstError::Config(format!(
                "lg_parts {} exceeds maximum {}",
                self.lg_parts, MAX_LG_PARTS
            )));
        }
        if self.block_size == 0 {
            return Err(BurstError::Config("block_size must be positive".to_string()));
        }
        if !(self.block_util > 0.0 && self.block_util <= 1.0) {
            return Err(BurstError::Config(format!(
                "block_util {} is outside (0, 1]",
                self.block_util
            )));
        }
        if self.block_batch_size == 0 {
            return Err(BurstError::Config(
                "block_batch_size must be positive".to_string(),
            ));
        }
        if self.partition_buffer_budget() == 0 {
            return Err(BurstError::Config(format!(
                "total_memtable_budget {} is too small for {} partitions",
                self.total_memtable_budget,
                self.num_parts()
            )));
        }
        Ok(())
    }
}

/// Builder for DirOptions
#[derive(Default)]
pub struct DirOptionsBuilder {
    options: DirOptions,
}

impl DirOptionsBuilder {
    /// Set the aggregate write buffer budget (in bytes)
    pub fn total_memtable_budget(mut self, bytes: usize) -> Self {
        self.options.total_memtable_budget = bytes;
        self
    }

    /// Set log2 of the partition count
    pub fn lg_parts(mut self, lg_parts: u32) -> Self {
        self.options.lg_parts = lg_parts;
        self
    }

    /// Set the target block size (in bytes)
    pub fn block_size(mut self, bytes: usize) -> Self {
        self.options.block_size = bytes;
        self
    }

    /// Set the block fill ratio
    pub fn block_util(mut self, util: f64) -> Self {
        self.options.block_util = util;
        self
    }

    /// Set the block batch size (in bytes)
    pub fn block_batch_size(mut self, bytes: usize) -> Self {
        self.options.block_batch_size = bytes;
        self
    }

    /// Set bloom filter bits per key
    pub fn bf_bits_per_key(mut self, bits: usize) -> Self {
        self.options.bf_bits_per_key = bits;
        self
    }

    /// Set the compression codec
    pub fn compression(mut self, compression: Compression) -> Self {
        self.options.compression = compression;
        self
    }

    pub fn force_compression(mut self, force: bool) -> Self {
        self.options.force_compression = force;
        self
    }

    pub fn unique_keys(mut self, unique: bool) -> Self {
        self.options.unique_keys = unique;
        self
    }

    pub fn skip_sort(mut self, skip: bool) -> Self {
        self.options.skip_sort = skip;
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.options.verify_checksums = verify;
        self
    }

    pub fn paranoid_checks(mut self, paranoid: bool) -> Self {
        self.options.paranoid_checks = paranoid;
        self
    }

    /// Run compactions on a shared pool
    pub fn compaction_pool(mut self, pool: Arc<ThreadPool>) -> Self {
        self.options.compaction_pool = Some(pool);
        self
    }

    pub fn allow_env_threads(mut self, allow: bool) -> Self {
        self.options.allow_env_threads = allow;
        self
    }

    pub fn key_size(mut self, bytes: usize) -> Self {
        self.options.key_size = bytes;
        self
    }

    pub fn value_size(mut self, bytes: usize) -> Self {
        self.options.value_size = bytes;
        self
    }

    pub fn data_buffer(mut self, bytes: usize) -> Self {
        self.options.data_buffer = bytes;
        self
    }

    pub fn index_buffer(mut self, bytes: usize) -> Self {
        self.options.index_buffer = bytes;
        self
    }

    /// Set the storage backend
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.options.backend = backend;
        self
    }

    pub fn build(self) -> DirOptions {
        self.options
    }
}
