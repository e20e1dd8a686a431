//! burstkv Bench Binary
//!
//! Bulk ingestion benchmarks for the directory store.
//!
//! - `io`: ingest synthetic entries in one epoch through a throttled
//!   backend and report write-side statistics
//! - `bf`: ingest into memory, read every key back, and report how many
//!   data blocks each lookup fetched

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use burstkv::{
    BatchCursor, BurstError, Compression, DirOptions, DirReader, DirWriter, Histogram,
    LocalBackend, MemBackend, Result, SyntheticBatch, ThreadPool, ThrottledBackend,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// burstkv bench
#[derive(Parser, Debug)]
#[command(name = "burstkv-bench")]
#[command(about = "Ingestion benchmarks for the burstkv directory store")]
#[command(version)]
struct Args {
    #[command(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ClapArgs, Debug)]
struct Common {
    /// Entries to insert, in Mi (2^20)
    #[arg(long, env = "NUM_FILES", default_value = "1", global = true)]
    num_files: u32,

    /// log2 of the partition count
    #[arg(long, env = "LG_PARTS", default_value = "0", global = true)]
    lg_parts: u32,

    /// Compaction pool threads (0 compacts on the inserting thread)
    #[arg(long, env = "NUM_THREADS", default_value = "4", global = true)]
    threads: usize,

    /// Aggregate write buffer budget in MiB
    #[arg(long, env = "MEMTABLE_SIZE", default_value = "32", global = true)]
    memtable_mb: usize,

    /// Block size in KiB
    #[arg(long, env = "BLOCK_SIZE", default_value = "128", global = true)]
    block_kb: usize,

    /// Block fill ratio
    #[arg(long, env = "BLOCK_UTIL", default_value = "0.996", global = true)]
    block_util: f64,

    /// Bloom filter bits per key
    #[arg(long, env = "BF_BITS", default_value = "8", global = true)]
    bf_bits: usize,

    #[arg(long, env = "KEY_SIZE", default_value = "8", global = true)]
    key_size: usize,

    #[arg(long, env = "VALUE_SIZE", default_value = "32", global = true)]
    value_size: usize,

    /// Insert keys in offset order instead of hashed order
    #[arg(long, env = "ORDERED_KEYS", global = true)]
    ordered_keys: bool,

    /// Trust insertion order instead of sorting buffers
    #[arg(long, env = "SKIP_SORT", global = true)]
    skip_sort: bool,

    /// Snappy-compress blocks
    #[arg(long, env = "SNAPPY", global = true)]
    snappy: bool,

    /// Keep compressed blocks even when they do not shrink
    #[arg(long, env = "FORCE_COMPRESSION", global = true)]
    force_compression: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write-path benchmark over a throttled backend
    Io {
        /// Emulated link speed in MiB/s (0 disables throttling)
        #[arg(long, env = "LINK_SPEED", default_value = "6")]
        link_speed: u64,

        /// Store directory
        #[arg(long, default_value = "/tmp/burstkv-bench")]
        dir: PathBuf,
    },

    /// Read-path filter benchmark over an in-memory backend
    Bf,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,burstkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("burstkv bench v{}", burstkv::VERSION);

    let result = match &args.command {
        Commands::Io { link_speed, dir } => run_io(&args.common, *link_speed, dir),
        Commands::Bf => run_bf(&args.common),
    };
    if let Err(e) = result {
        tracing::error!("Benchmark failed: {}", e);
        std::process::exit(1);
    }
}

// =============================================================================
// Shared Setup
// =============================================================================

fn base_options(common: &Common) -> Result<DirOptions> {
    let mut builder = DirOptions::builder()
        .lg_parts(common.lg_parts)
        .total_memtable_budget(common.memtable_mb << 20)
        .block_size(common.block_kb << 10)
        .block_util(common.block_util)
        .bf_bits_per_key(common.bf_bits)
        .key_size(common.key_size)
        .value_size(common.value_size)
        .skip_sort(common.skip_sort)
        .force_compression(common.force_compression)
        .compression(if common.snappy {
            Compression::Snappy
        } else {
            Compression::None
        });

    builder = if common.threads != 0 {
        builder.compaction_pool(Arc::new(ThreadPool::new_fixed(common.threads)?))
    } else {
        builder.allow_env_threads(false)
    };
    Ok(builder.build())
}

fn total_entries(common: &Common) -> Result<u32> {
    common.num_files.checked_mul(1 << 20).ok_or_else(|| {
        BurstError::Config(format!(
            "num-files {} exceeds the {} Mi entry limit",
            common.num_files,
            u32::MAX >> 20
        ))
    })
}

/// Insert every entry of the synthetic batch into epoch 0 and finish
fn ingest(writer: &DirWriter, common: &Common) -> Result<()> {
    let mut batch = SyntheticBatch::new(
        total_entries(common)?,
        common.key_size,
        common.value_size,
        common.ordered_keys,
    );
    batch.seek(0);
    while batch.valid() {
        writer.append(batch.fid(), batch.data(), 0)?;
        if batch.offset() % (1 << 20) == (1 << 20) - 1 {
            tracing::info!(
                "Inserted {:.2}%",
                100.0 * (batch.offset() + 1) as f64 / batch.total() as f64
            );
        }
        batch.next();
    }
    batch.status()?;

    writer.epoch_flush(0)?;
    writer.finish()
}

fn print_writer_stats(writer: &DirWriter, elapsed: Duration) {
    const KI: f64 = 1024.0;
    let io = writer.io_stats();
    println!("----------------------------------------");
    println!(
        "     Total Memory Usage: {:.3} MB",
        writer.total_memory_usage() as f64 / KI / KI
    );
    println!("             Total Time: {:.3} s", elapsed.as_secs_f64());
    println!("          Num of Tables: {}", writer.num_tables());
    println!(
        "   Estimated Table Size: {:.3} MB",
        writer.estimated_table_size() as f64 / KI / KI
    );
    println!(
        "              Data Size: {:.3} MB",
        writer.data_size() as f64 / KI / KI
    );
    println!(
        "             Index Size: {:.3} MB",
        writer.index_size() as f64 / KI / KI
    );
    println!(
        "            Filter Size: {:.3} MB",
        writer.filter_size() as f64 / KI / KI
    );
    println!(
        "          Data Writes: {:.3} MB in {} ops",
        io.data_bytes as f64 / KI / KI,
        io.data_ops
    );
    println!(
        "         Index Writes: {:.3} MB in {} ops",
        io.index_bytes as f64 / KI / KI,
        io.index_ops
    );
}

// =============================================================================
// io
// =============================================================================

fn run_io(common: &Common, link_speed: u64, dir: &Path) -> Result<()> {
    let throttled = Arc::new(ThrottledBackend::new(
        Arc::new(LocalBackend::new()),
        link_speed << 20,
    ));
    let mut options = base_options(common)?;
    options.backend = throttled.clone();

    let writer = DirWriter::open(options.clone(), dir)?;
    tracing::info!("Inserting data...");
    let start = Instant::now();
    ingest(&writer, common)?;
    let elapsed = start.elapsed();
    tracing::info!("Done!");

    print_writer_stats(&writer, elapsed);
    for (name, suffix) in [("data", ".dat"), ("index", ".idx")] {
        if let Some(hist) = throttled.histogram(suffix) {
            println!(
                "  Avg Time Between {} Writes: {:.3} ms (p99 {:.3} ms, {} samples)",
                name,
                hist.average() / 1000.0,
                hist.percentile(99.0) / 1000.0,
                hist.count()
            );
        }
    }

    drop(writer);
    burstkv::destroy_dir(dir, &options)
}

// =============================================================================
// bf
// =============================================================================

fn run_bf(common: &Common) -> Result<()> {
    let mut options = base_options(common)?;
    options.backend = Arc::new(MemBackend::new());
    let dir = PathBuf::from("/bench");

    let writer = DirWriter::open(options.clone(), &dir)?;
    tracing::info!("Inserting data...");
    let start = Instant::now();
    ingest(&writer, common)?;
    print_writer_stats(&writer, start.elapsed());
    drop(writer);

    let reader = DirReader::open(options, &dir)?;
    let batch = SyntheticBatch::new(
        total_entries(common)?,
        common.key_size,
        common.value_size,
        common.ordered_keys,
    );

    tracing::info!("Reading data...");
    let mut fetches = Histogram::new();
    let mut misses = 0u64;
    let start = Instant::now();
    for offset in 0..batch.total() {
        let before = reader.io_stats().data_ops;
        let value = reader.read_all(&batch.key_at(offset))?;
        fetches.add((reader.io_stats().data_ops - before) as f64);
        if value.is_empty() {
            misses += 1;
        }
    }
    let elapsed = start.elapsed();

    println!("----------------------------------------");
    println!("             Total Time: {:.3} s", elapsed.as_secs_f64());
    println!("          Keys Read: {} ({} empty)", batch.total(), misses);
    println!(
        "  Blocks Fetched / Read: avg {:.3}, p50 {:.0}, p99 {:.0}, max {:.0}",
        fetches.average(),
        fetches.median(),
        fetches.percentile(99.0),
        fetches.max()
    );
    Ok(())
}
