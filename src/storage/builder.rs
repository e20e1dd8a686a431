//! Fragment builder
//!
//! Writes one table fragment: data blocks into the partition's data log,
//! then the fragment's filter and block index into its index log.

use crate::config::DirOptions;
use crate::error::{BurstError, Result};
use crate::filter::BloomBuilder;

use super::format::{compress_block, write_block, BlockHandle, BlockType};
use super::{BlockBuilder, FragmentMeta, LogSink};

/// Pre-compression byte totals of one fragment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FragmentSizes {
    pub data: u64,
    pub index: u64,
    pub filter: u64,
}

/// Builds one fragment from entries supplied in key order
pub struct FragmentBuilder<'a> {
    options: &'a DirOptions,
    data_log: &'a mut LogSink,
    index_log: &'a mut LogSink,
    filter: &'a mut BloomBuilder,

    block: BlockBuilder,
    index_block: BlockBuilder,
    block_threshold: usize,

    /// Sealed blocks not yet handed to the data log
    batch: Vec<u8>,

    last_key: Vec<u8>,
    num_entries: u64,
    sizes: FragmentSizes,
}

impl<'a> FragmentBuilder<'a> {
    pub fn new(
        options: &'a DirOptions,
        data_log: &'a mut LogSink,
        index_log: &'a mut LogSink,
        filter: &'a mut BloomBuilder,
    ) -> Self {
        Self {
            options,
            data_log,
            index_log,
            filter,
            block: BlockBuilder::with_capacity(options.block_size),
            index_block: BlockBuilder::new(),
            block_threshold: options.block_threshold(),
            batch: Vec::with_capacity(options.block_batch_size),
            last_key: Vec::new(),
            num_entries: 0,
            sizes: FragmentSizes::default(),
        }
    }

    /// Add an entry. Keys must arrive in non-decreasing order; equal keys
    /// are kept as separate entries.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let first = self.num_entries == 0;
        if !first && self.options.paranoid_checks && key < self.last_key.as_slice() {
            return Err(BurstError::Corruption(format!(
                "keys out of order: {:?} after {:?}",
                String::from_utf8_lossy(key),
                String::from_utf8_lossy(&self.last_key)
            )));
        }
        if first || key != self.last_key.as_slice() {
            self.filter.add(key);
            self.last_key.clear();
            self.last_key.extend_from_slice(key);
        }

        self.block.add(key, value);
        self.num_entries += 1;

        if self.block.size_estimate() >= self.block_threshold {
            self.seal_block()?;
        }
        Ok(())
    }

    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    fn seal_block(&mut self) -> Result<()> {
        let last_key = self.block.last_key().to_vec();
        let raw = self.block.finish();
        self.sizes.data += raw.len() as u64;

        let (payload, block_type) = compress_block(
            raw,
            self.options.compression,
            self.options.force_compression,
            self.options.paranoid_checks,
        )?;
        let handle = BlockHandle::new(
            self.data_log.offset() + self.batch.len() as u64,
            payload.len() as u64,
        );
        write_block(&mut self.batch, &payload, block_type);
        self.index_block.add(&last_key, &handle.encode());

        if self.batch.len() >= self.options.block_batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        tracing::trace!(bytes = self.batch.len(), "Flushing block batch");
        self.data_log.append(&self.batch)?;
        self.batch.clear();
        Ok(())
    }

    /// Seal the last block, write filter and index, and describe the
    /// fragment. Both logs are flushed to the backend before returning.
    pub fn finish(mut self, epoch: u32, seq: u32) -> Result<(FragmentMeta, FragmentSizes)> {
        if !self.block.is_empty() {
            self.seal_block()?;
        }
        self.flush_batch()?;

        let filter_bytes = self.filter.finish();
        let filter = if filter_bytes.is_empty() {
            None
        } else {
            self.sizes.filter += filter_bytes.len() as u64;
            Some(self.write_index_stream(filter_bytes, false)?)
        };

        let index_raw = self.index_block.finish();
        self.sizes.index += index_raw.len() as u64;
        let index = self.write_index_stream(index_raw, true)?;

        self.data_log.flush()?;
        self.index_log.flush()?;

        let meta = FragmentMeta {
            epoch,
            seq,
            num_entries: self.num_entries,
            filter,
            index,
            data_bytes: self.sizes.data,
        };
        Ok((meta, self.sizes))
    }

    fn write_index_stream(&mut self, raw: Vec<u8>, compressible: bool) -> Result<BlockHandle> {
        let (payload, block_type) = if compressible {
            compress_block(
                raw,
                self.options.compression,
                self.options.force_compression,
                self.options.paranoid_checks,
            )?
        } else {
            (raw, BlockType::Raw)
        };
        let handle = BlockHandle::new(self.index_log.offset(), payload.len() as u64);
        let mut stored = Vec::with_capacity(payload.len() + super::BLOCK_TRAILER_SIZE);
        write_block(&mut stored, &payload, block_type);
        self.index_log.append(&stored)?;
        Ok(handle)
    }
}
