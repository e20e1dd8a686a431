//! Fragment reader
//!
//! Point lookups inside one table fragment: filter gate, block index
//! search, then block scans.

use crate::backend::RandomAccessFile;
use crate::error::Result;
use crate::filter::bloom_may_match;
use crate::metrics::IoCounters;

use super::format::{read_block, BlockHandle};
use super::{Block, FragmentMeta};

/// The in-memory index part of a fragment: filter and block index
#[derive(Debug)]
pub struct FragmentIndex {
    meta: FragmentMeta,
    filter: Vec<u8>,
    index: Block,
}

impl FragmentIndex {
    /// Fetch filter and block index from the partition's index log
    pub fn load(
        meta: &FragmentMeta,
        index_log: &dyn RandomAccessFile,
        verify: bool,
        counters: &IoCounters,
    ) -> Result<Self> {
        let filter = match &meta.filter {
            Some(handle) => {
                counters.record_index(handle.stored_size() as usize);
                read_block(index_log, handle, verify)?
            }
            None => Vec::new(),
        };

        counters.record_index(meta.index.stored_size() as usize);
        let index = Block::new(read_block(index_log, &meta.index, verify)?)?;

        Ok(Self {
            meta: meta.clone(),
            filter,
            index,
        })
    }

    pub fn meta(&self) -> &FragmentMeta {
        &self.meta
    }

    /// Whether the filter admits `key` (always true without a filter)
    pub fn may_contain(&self, key: &[u8]) -> bool {
        bloom_may_match(key, &self.filter)
    }

    /// Append every value stored under `key`, in stored order, to `out`.
    /// Returns the number of matching entries.
    pub fn get_all(
        &self,
        key: &[u8],
        data_log: &dyn RandomAccessFile,
        verify: bool,
        counters: &IoCounters,
        out: &mut Vec<u8>,
    ) -> Result<usize> {
        if !self.may_contain(key) {
            return Ok(0);
        }

        let mut matches = 0;
        let mut index_iter = self.index.iter();
        index_iter.seek(key)?;
        while index_iter.valid() {
            let handle = BlockHandle::decode(index_iter.value())?;
            counters.record_data(handle.stored_size() as usize);
            let block = Block::new(read_block(data_log, &handle, verify)?)?;

            let mut iter = block.iter();
            iter.seek(key)?;
            while iter.valid() && iter.key() == key {
                out.extend_from_slice(iter.value());
                matches += 1;
                iter.next()?;
            }

            // Equal keys may continue into the next block only when this
            // block ends with the key
            if index_iter.key() != key {
                break;
            }
            index_iter.next()?;
        }
        Ok(matches)
    }
}
