//! Directory writer

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

use crate::compaction::CompactionScheduler;
use crate::config::DirOptions;
use crate::error::{BurstError, Result};
use crate::filter::BloomBuilder;
use crate::memtable::{BufferPolicy, SealedBuffer, WriteBuffer};
use crate::metrics::{IoCounters, IoStats};
use crate::partition::Partitioner;
use crate::storage::{
    data_log_name, index_log_name, Directory, FragmentBuilder, FragmentMeta, FragmentSizes,
    LogSink, Stream, DIRECTORY_FILE,
};

// =============================================================================
// Partition State
// =============================================================================

/// Foreground side of a partition, guarded by `Partition::state`
struct BufferState {
    active: WriteBuffer,
    /// Memory held by the sealed buffer under compaction, if any
    compacting: Option<usize>,
    next_seq: u32,
    /// Latched compaction failure
    error: Option<BurstError>,
}

/// Background side of a partition. Only one compaction holds it at a time.
struct PartitionLog {
    data: LogSink,
    index: LogSink,
    filter: BloomBuilder,
    fragments: Vec<FragmentMeta>,
    sizes: FragmentSizes,
}

struct Partition {
    id: usize,
    state: Mutex<BufferState>,
    /// Signalled whenever a compaction of this partition completes
    idle: Condvar,
    log: Mutex<PartitionLog>,
}

/// State shared with background compactions
struct Shared {
    options: DirOptions,
    partitions: Vec<Partition>,
    counters: Arc<IoCounters>,
    /// First failure latched by any partition
    bg_error: Mutex<Option<BurstError>>,
}

struct EpochState {
    current: u32,
    finished: bool,
}

fn new_buffer(options: &DirOptions) -> WriteBuffer {
    let mut buffer = WriteBuffer::with_policy(BufferPolicy {
        skip_sort: options.skip_sort,
        unique_keys: options.unique_keys,
    });
    let entry_bytes = (options.key_size + options.value_size).max(1);
    buffer.reserve(options.partition_buffer_budget() / entry_bytes, entry_bytes);
    buffer
}

// =============================================================================
// DirWriter
// =============================================================================

/// Writes one directory store.
///
/// All methods take `&self`; a writer can be shared across ingest threads
/// through `Arc`.
pub struct DirWriter {
    path: PathBuf,
    partitioner: Partitioner,
    /// Active buffer size that triggers a seal
    buffer_budget: usize,
    shared: Arc<Shared>,
    scheduler: CompactionScheduler,
    epoch: RwLock<EpochState>,
}

impl DirWriter {
    /// Create the store layout at `path` and return a writer at epoch 0.
    ///
    /// Existing partition logs are truncated.
    pub fn open(options: DirOptions, path: impl AsRef<Path>) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref().to_path_buf();
        let backend = Arc::clone(&options.backend);
        backend.create_dir_all(&path)?;

        // Invalidate any directory left by an earlier writer
        backend.new_writable(&path.join(DIRECTORY_FILE))?.sync()?;

        let counters = Arc::new(IoCounters::new());
        let mut partitions = Vec::with_capacity(options.num_parts());
        for id in 0..options.num_parts() {
            let data = LogSink::new(
                backend.new_writable(&path.join(data_log_name(id)))?,
                Stream::Data,
                options.data_buffer,
                Arc::clone(&counters),
            );
            let index = LogSink::new(
                backend.new_writable(&path.join(index_log_name(id)))?,
                Stream::Index,
                options.index_buffer,
                Arc::clone(&counters),
            );
            partitions.push(Partition {
                id,
                state: Mutex::new(BufferState {
                    active: new_buffer(&options),
                    compacting: None,
                    next_seq: 0,
                    error: None,
                }),
                idle: Condvar::new(),
                log: Mutex::new(PartitionLog {
                    data,
                    index,
                    filter: BloomBuilder::new(options.bf_bits_per_key),
                    fragments: Vec::new(),
                    sizes: FragmentSizes::default(),
                }),
            });
        }

        let scheduler = CompactionScheduler::from_options(&options);
        let buffer_budget = options.partition_buffer_budget();
        tracing::info!(
            path = %path.display(),
            lg_parts = options.lg_parts,
            buffer_budget,
            scheduler = ?scheduler,
            "Opened directory writer"
        );

        Ok(Self {
            path,
            partitioner: Partitioner::new(options.lg_parts),
            buffer_budget,
            shared: Arc::new(Shared {
                options,
                partitions,
                counters,
                bg_error: Mutex::new(None),
            }),
            scheduler,
            epoch: RwLock::new(EpochState {
                current: 0,
                finished: false,
            }),
        })
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append an entry to the current epoch.
    ///
    /// Blocks while the owning partition is full and its previous buffer is
    /// still compacting.
    pub fn append(&self, key: &[u8], value: &[u8], epoch: u32) -> Result<()> {
        let state = self.epoch.read();
        self.check_usable(&state, epoch)?;

        let part = &self.shared.partitions[self.partitioner.partition_of(key)];
        let mut buf = part.state.lock();
        if let Some(e) = &buf.error {
            return Err(e.replicate());
        }

        buf.active.add(key, value);
        if buf.active.bytes() >= self.buffer_budget {
            self.seal(part, buf, epoch, false)?;
        }
        Ok(())
    }

    /// Seal `epoch` in every partition and advance to `epoch + 1`.
    ///
    /// Compactions are submitted but not awaited. A failure already latched
    /// by any compaction stops the flush and leaves the epoch unchanged.
    pub fn epoch_flush(&self, epoch: u32) -> Result<()> {
        let mut state = self.epoch.write();
        self.check_usable(&state, epoch)?;
        self.seal_all(epoch)?;
        // Inline compactions have already run; their failure fails the flush
        self.check_background()?;
        state.current += 1;
        tracing::debug!(epoch, "Epoch flushed");
        Ok(())
    }

    /// Seal the current epoch, wait for every compaction, and write the
    /// fragment directory. The store is readable once this returns `Ok`.
    pub fn finish(&self) -> Result<()> {
        let mut state = self.epoch.write();
        if state.finished {
            return Err(BurstError::InvalidArgument(
                "writer already finished".to_string(),
            ));
        }
        state.finished = true;
        let start = Instant::now();

        let sealed = self.seal_all(state.current);
        self.scheduler.join_all();
        sealed?;
        self.check_background()?;

        let options = &self.shared.options;
        let mut directory = Directory::new(options.lg_parts, options.unique_keys);
        directory.num_epochs = state.current + 1;
        for (part, fragments) in self.shared.partitions.iter().zip(directory.partitions.iter_mut()) {
            let mut log = part.log.lock();
            log.data.sync()?;
            log.index.sync()?;
            fragments.clone_from(&log.fragments);
        }

        let mut file = options.backend.new_writable(&self.path.join(DIRECTORY_FILE))?;
        file.append(&directory.encode()?)?;
        file.sync()?;

        tracing::info!(
            path = %self.path.display(),
            epochs = directory.num_epochs,
            tables = directory.num_fragments(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Finished directory writer"
        );
        Ok(())
    }

    fn check_usable(&self, state: &EpochState, epoch: u32) -> Result<()> {
        if state.finished {
            return Err(BurstError::InvalidArgument(
                "writer already finished".to_string(),
            ));
        }
        if epoch != state.current {
            return Err(BurstError::InvalidArgument(format!(
                "epoch {} is not the current epoch {}",
                epoch, state.current
            )));
        }
        self.check_background()
    }

    fn check_background(&self) -> Result<()> {
        match &*self.shared.bg_error.lock() {
            Some(e) => Err(e.replicate()),
            None => Ok(()),
        }
    }

    fn seal_all(&self, epoch: u32) -> Result<()> {
        for part in &self.shared.partitions {
            self.check_background()?;
            self.seal(part, part.state.lock(), epoch, true)?;
        }
        Ok(())
    }

    /// Swap out the partition's active buffer and submit it for compaction.
    ///
    /// Waits for the partition's previous compaction first. Without `force`,
    /// a buffer that dropped below budget while waiting is left alone.
    fn seal(
        &self,
        part: &Partition,
        mut buf: MutexGuard<'_, BufferState>,
        epoch: u32,
        force: bool,
    ) -> Result<()> {
        while buf.compacting.is_some() {
            part.idle.wait(&mut buf);
        }
        if let Some(e) = &buf.error {
            return Err(e.replicate());
        }
        if buf.active.is_empty() || (!force && buf.active.bytes() < self.buffer_budget) {
            return Ok(());
        }

        let full = mem::replace(&mut buf.active, new_buffer(&self.shared.options));
        let seq = buf.next_seq;
        buf.next_seq += 1;
        buf.compacting = Some(full.memory_usage());
        drop(buf);

        // Sort outside the partition lock
        let sealed = full.finish();
        let shared = Arc::clone(&self.shared);
        let id = part.id;
        self.scheduler
            .submit(move || shared.run_compaction(id, sealed, epoch, seq));
        Ok(())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Epoch that appends must currently target
    pub fn current_epoch(&self) -> u32 {
        self.epoch.read().current
    }

    pub fn num_parts(&self) -> usize {
        self.partitioner.num_parts()
    }

    /// Bytes held by active and compacting buffers across all partitions
    pub fn total_memory_usage(&self) -> usize {
        self.shared
            .partitions
            .iter()
            .map(|p| {
                let buf = p.state.lock();
                buf.active.memory_usage() + buf.compacting.unwrap_or(0)
            })
            .sum()
    }

    /// Expected entry bytes of one table fragment (one partition's buffer share)
    pub fn estimated_table_size(&self) -> usize {
        self.buffer_budget
    }

    /// Table fragments written so far
    pub fn num_tables(&self) -> usize {
        self.shared
            .partitions
            .iter()
            .map(|p| p.log.lock().fragments.len())
            .sum()
    }

    /// Uncompressed bytes of index blocks written so far
    pub fn index_size(&self) -> u64 {
        self.sum_sizes(|s| s.index)
    }

    /// Bytes of filter blocks written so far
    pub fn filter_size(&self) -> u64 {
        self.sum_sizes(|s| s.filter)
    }

    /// Uncompressed bytes of data blocks written so far
    pub fn data_size(&self) -> u64 {
        self.sum_sizes(|s| s.data)
    }

    fn sum_sizes(&self, field: impl Fn(&FragmentSizes) -> u64) -> u64 {
        self.shared
            .partitions
            .iter()
            .map(|p| field(&p.log.lock().sizes))
            .sum()
    }

    pub fn io_stats(&self) -> IoStats {
        self.shared.counters.snapshot()
    }
}

impl Drop for DirWriter {
    fn drop(&mut self) {
        // Background tasks must not outlive an abandoned writer's logs
        self.scheduler.join_all();
    }
}

// =============================================================================
// Compaction
// =============================================================================

impl Shared {
    fn run_compaction(&self, id: usize, sealed: SealedBuffer, epoch: u32, seq: u32) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.compact(id, &sealed, epoch, seq)
        }))
        .unwrap_or_else(|_| {
            Err(BurstError::Background(format!(
                "compaction of partition {} panicked",
                id
            )))
        });
        drop(sealed);

        let part = &self.partitions[id];
        let mut buf = part.state.lock();
        if let Err(e) = result {
            tracing::warn!(partition = id, epoch, error = %e, "Compaction failed, latching error");
            let mut bg = self.bg_error.lock();
            if bg.is_none() {
                *bg = Some(e.replicate());
            }
            if buf.error.is_none() {
                buf.error = Some(e);
            }
        }
        buf.compacting = None;
        part.idle.notify_all();
    }

    fn compact(&self, id: usize, sealed: &SealedBuffer, epoch: u32, seq: u32) -> Result<()> {
        let start = Instant::now();
        let mut guard = self.partitions[id].log.lock();
        let log = &mut *guard;

        let mut builder =
            FragmentBuilder::new(&self.options, &mut log.data, &mut log.index, &mut log.filter);
        for (key, value) in sealed.entries() {
            builder.add(key, value)?;
        }
        let (meta, sizes) = builder.finish(epoch, seq)?;

        tracing::debug!(
            partition = id,
            epoch,
            seq,
            entries = meta.num_entries,
            data_bytes = sizes.data,
            index_bytes = sizes.index,
            filter_bytes = sizes.filter,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Compacted write buffer"
        );

        log.fragments.push(meta);
        log.sizes.data += sizes.data;
        log.sizes.index += sizes.index;
        log.sizes.filter += sizes.filter;
        Ok(())
    }
}
