//! Directory reader

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::RandomAccessFile;
use crate::config::DirOptions;
use crate::error::{BurstError, Result};
use crate::metrics::{IoCounters, IoStats};
use crate::partition::Partitioner;
use crate::storage::{
    data_log_name, index_log_name, Directory, FragmentIndex, FragmentMeta, DIRECTORY_FILE,
};

/// A fragment and its lazily loaded filter + block index
struct FragmentSlot {
    meta: FragmentMeta,
    index: Mutex<Option<Arc<FragmentIndex>>>,
}

struct PartitionReader {
    /// Data and index logs; `None` for a partition that never flushed
    logs: Option<(Arc<dyn RandomAccessFile>, Arc<dyn RandomAccessFile>)>,
    /// Ascending (epoch, seq)
    fragments: Vec<FragmentSlot>,
}

/// Read-only view of a finished store
pub struct DirReader {
    path: PathBuf,
    verify_checksums: bool,
    directory: Directory,
    partitioner: Partitioner,
    partitions: Vec<PartitionReader>,
    counters: IoCounters,
}

impl DirReader {
    /// Open the store at `path`.
    ///
    /// The partition count comes from the store's directory file, not from
    /// `options.lg_parts`.
    pub fn open(options: DirOptions, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let backend = &options.backend;

        let dir_path = path.join(DIRECTORY_FILE);
        if !backend.exists(&dir_path) {
            return Err(BurstError::NotFound(format!(
                "no directory file at {}",
                dir_path.display()
            )));
        }
        let file = backend.new_random_access(&dir_path)?;
        let bytes = file.read_at(0, file.size()? as usize)?;
        let directory = Directory::decode(&bytes)?;

        if directory.lg_parts != options.lg_parts {
            tracing::debug!(
                configured = options.lg_parts,
                persisted = directory.lg_parts,
                "Using persisted partition count"
            );
        }

        let mut partitions = Vec::with_capacity(directory.partitions.len());
        for (id, metas) in directory.partitions.iter().enumerate() {
            let logs = if metas.is_empty() {
                None
            } else {
                Some((
                    backend.new_random_access(&path.join(data_log_name(id)))?,
                    backend.new_random_access(&path.join(index_log_name(id)))?,
                ))
            };

            let mut fragments: Vec<FragmentSlot> = metas
                .iter()
                .map(|meta| FragmentSlot {
                    meta: meta.clone(),
                    index: Mutex::new(None),
                })
                .collect();
            fragments.sort_by_key(|f| (f.meta.epoch, f.meta.seq));

            partitions.push(PartitionReader { logs, fragments });
        }

        tracing::info!(
            path = %path.display(),
            lg_parts = directory.lg_parts,
            epochs = directory.num_epochs,
            tables = directory.num_fragments(),
            "Opened directory reader"
        );

        Ok(Self {
            path,
            verify_checksums: options.verify_checksums,
            partitioner: Partitioner::new(directory.lg_parts),
            directory,
            partitions,
            counters: IoCounters::new(),
        })
    }

    /// Every value ever appended under `key`, concatenated in ascending
    /// epoch order and insertion order within an epoch. A key that was
    /// never written reads as empty.
    pub fn read_all(&self, key: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let part = &self.partitions[self.partitioner.partition_of(key)];
        let Some((data_log, index_log)) = &part.logs else {
            return Ok(out);
        };

        for slot in &part.fragments {
            let fragment = self.load_fragment(slot, index_log.as_ref())?;
            fragment.get_all(
                key,
                data_log.as_ref(),
                self.verify_checksums,
                &self.counters,
                &mut out,
            )?;
        }
        Ok(out)
    }

    fn load_fragment(
        &self,
        slot: &FragmentSlot,
        index_log: &dyn RandomAccessFile,
    ) -> Result<Arc<FragmentIndex>> {
        let mut cached = slot.index.lock();
        if let Some(fragment) = cached.as_ref() {
            return Ok(Arc::clone(fragment));
        }
        let fragment = Arc::new(FragmentIndex::load(
            &slot.meta,
            index_log,
            self.verify_checksums,
            &self.counters,
        )?);
        *cached = Some(Arc::clone(&fragment));
        Ok(fragment)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_parts(&self) -> usize {
        self.partitioner.num_parts()
    }

    /// Epochs sealed by the writer
    pub fn num_epochs(&self) -> u32 {
        self.directory.num_epochs
    }

    pub fn num_tables(&self) -> usize {
        self.directory.num_fragments()
    }

    pub fn unique_keys(&self) -> bool {
        self.directory.unique_keys
    }

    pub fn io_stats(&self) -> IoStats {
        self.counters.snapshot()
    }
}
