//! Tests for DirWriter / DirReader
//!
//! These tests verify:
//! - Empty, single-epoch and multi-epoch stores read back correctly
//! - Unique-key merging and duplicate retention across epochs
//! - Compression and filters never change what a read returns
//! - A bulk load of 65,536 keys over two epochs
//! - Repeated readers return identical bytes
//! - Protocol misuse and bad options are rejected
//! - Backpressure under a tiny memory budget
//! - Inline, ephemeral-thread and pool scheduling agree
//! - Concurrent appends from several threads
//! - Writer diagnostics and I/O accounting
//! - Stores on the local filesystem, reopen and destroy

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use burstkv::{
    destroy_dir, BurstError, Compression, DirOptions, DirOptionsBuilder, DirReader, DirWriter,
    LocalBackend, MemBackend, ThreadPool,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn store_path() -> PathBuf {
    PathBuf::from("/store")
}

/// In-memory store with small blocks and compaction on the caller's thread
fn mem_options() -> DirOptionsBuilder {
    DirOptions::builder()
        .backend(Arc::new(MemBackend::new()))
        .lg_parts(2)
        .total_memtable_budget(1 << 20)
        .block_size(4096)
        .verify_checksums(true)
        .allow_env_threads(false)
}

/// Run `(epoch, key, value)` appends in order, flushing each epoch as the
/// script moves past it, then finish
fn write_script(options: &DirOptions, script: &[(u32, &str, &str)]) -> DirWriter {
    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    let mut epoch = 0;
    for &(e, key, value) in script {
        while epoch < e {
            writer.epoch_flush(epoch).unwrap();
            epoch += 1;
        }
        writer.append(key.as_bytes(), value.as_bytes(), epoch).unwrap();
    }
    writer.epoch_flush(epoch).unwrap();
    writer.finish().unwrap();
    writer
}

fn read(reader: &DirReader, key: &str) -> String {
    String::from_utf8(reader.read_all(key.as_bytes()).unwrap()).unwrap()
}

fn bulk_key(i: u32) -> Vec<u8> {
    format!("{:08x}", i.wrapping_mul(2654435761)).into_bytes()
}

// =============================================================================
// Read-Back Tests
// =============================================================================

#[test]
fn test_empty_store() {
    let options = mem_options().build();
    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    writer.finish().unwrap();
    assert_eq!(writer.num_tables(), 0);

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(reader.num_tables(), 0);
    assert!(reader.read_all(b"non-exists").unwrap().is_empty());
}

#[test]
fn test_single_epoch() {
    let options = mem_options().build();
    write_script(&options, &[(0, "k1", "v1"), (0, "k2", "v2"), (0, "k3", "v3")]);

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(read(&reader, "k1"), "v1");
    assert_eq!(read(&reader, "k2"), "v2");
    assert_eq!(read(&reader, "k3"), "v3");
    assert_eq!(read(&reader, "k4"), "");
    assert_eq!(read(&reader, "non-exists"), "");
}

#[test]
fn test_multi_epoch() {
    let options = mem_options().build();
    write_script(
        &options,
        &[
            (0, "k1", "v1"),
            (0, "k2", "v2"),
            (1, "k1", "v3"),
            (1, "k3", "v4"),
            (2, "k1", "v5"),
        ],
    );

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(read(&reader, "k1"), "v1v3v5");
    assert_eq!(read(&reader, "k2"), "v2");
    assert_eq!(read(&reader, "k3"), "v4");
    assert_eq!(read(&reader, "k4"), "");
}

#[test]
fn test_unique_keys_merge_within_epoch() {
    let options = mem_options().unique_keys(true).build();
    write_script(
        &options,
        &[(0, "k1", "v1"), (0, "k2", "x"), (0, "k1", "v2"), (1, "k1", "v3")],
    );

    let reader = DirReader::open(options, store_path()).unwrap();
    assert!(reader.unique_keys());
    assert_eq!(read(&reader, "k1"), "v1v2v3");
    assert_eq!(read(&reader, "k2"), "x");
}

#[test]
fn test_no_unique_keys() {
    let options = mem_options().unique_keys(false).build();
    write_script(
        &options,
        &[
            (0, "k1", "v1"),
            (0, "k1", "v2"),
            (1, "k0", "v3"),
            (1, "k1", "v4"),
            (1, "k1", "v5"),
            (2, "k1", "v6"),
            (2, "k1", "v7"),
            (2, "k5", "v8"),
            (3, "k1", "v9"),
        ],
    );

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(read(&reader, "k0"), "v3");
    assert_eq!(read(&reader, "k1"), "v1v2v4v5v6v7v9");
    assert_eq!(read(&reader, "k5"), "v8");
    assert_eq!(read(&reader, "k2"), "");
}

#[test]
fn test_skip_sort_with_sorted_input() {
    let options = mem_options()
        .lg_parts(0)
        .skip_sort(true)
        .unique_keys(false)
        .paranoid_checks(true)
        .build();
    write_script(
        &options,
        &[(0, "a", "1"), (0, "b", "2"), (0, "b", "3"), (1, "a", "4")],
    );

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(read(&reader, "a"), "14");
    assert_eq!(read(&reader, "b"), "23");
}

#[test]
fn test_no_filter() {
    let options = mem_options().bf_bits_per_key(0).build();
    let writer = write_script(
        &options,
        &[(0, "k1", "v1"), (0, "k2", "v2"), (1, "k1", "v3")],
    );
    assert_eq!(writer.filter_size(), 0);

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(read(&reader, "k1"), "v1v3");
    assert_eq!(read(&reader, "k2"), "v2");
    assert_eq!(read(&reader, "k3"), "");
    assert_eq!(read(&reader, "non-exists"), "");
}

#[test]
fn test_forced_snappy_matches_uncompressed() {
    let script: Vec<(u32, String, String)> = (0..3000u32)
        .map(|i| (i / 1000, format!("key{:05}", i % 700), "payload-".repeat(4)))
        .collect();
    let script: Vec<(u32, &str, &str)> = script
        .iter()
        .map(|(e, k, v)| (*e, k.as_str(), v.as_str()))
        .collect();

    let plain = mem_options().build();
    let snappy = mem_options()
        .compression(Compression::Snappy)
        .force_compression(true)
        .paranoid_checks(true)
        .build();
    write_script(&plain, &script);
    let writer = write_script(&snappy, &script);
    assert!(writer.io_stats().data_bytes < writer.data_size());

    let plain = DirReader::open(plain, store_path()).unwrap();
    let snappy = DirReader::open(snappy, store_path()).unwrap();
    for i in 0..800 {
        let key = format!("key{:05}", i);
        assert_eq!(read(&plain, &key), read(&snappy, &key));
    }
}

#[test]
fn test_large_batch() {
    const KEYS: u32 = 65536;
    let options = mem_options()
        .total_memtable_budget(4 << 20)
        .value_size(32)
        .key_size(8)
        .build();
    let value = [b'v'; 32];

    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    for epoch in 0..2 {
        for i in 0..KEYS {
            writer.append(&bulk_key(i), &value, epoch).unwrap();
        }
        writer.epoch_flush(epoch).unwrap();
    }
    writer.finish().unwrap();

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(reader.num_epochs(), 3);
    for i in 0..KEYS {
        let got = reader.read_all(&bulk_key(i)).unwrap();
        assert_eq!(got.len(), 64, "key {}", i);
    }
    assert!(reader.read_all(b"non-exists").unwrap().is_empty());
}

#[test]
fn test_reader_is_idempotent() {
    let options = mem_options().build();
    write_script(
        &options,
        &[(0, "k1", "v1"), (1, "k1", "v2"), (1, "k2", "v3")],
    );

    let first = DirReader::open(options.clone(), store_path()).unwrap();
    let a = first.read_all(b"k1").unwrap();
    let again = first.read_all(b"k1").unwrap();
    let second = DirReader::open(options, store_path()).unwrap();
    let b = second.read_all(b"k1").unwrap();

    assert_eq!(a, b"v1v2".to_vec());
    assert_eq!(a, again);
    assert_eq!(a, b);
}

#[test]
fn test_reader_uses_persisted_partition_count() {
    let options = mem_options().lg_parts(3).build();
    write_script(&options, &[(0, "k1", "v1"), (0, "k2", "v2")]);

    let mut other = options.clone();
    other.lg_parts = 0;
    let reader = DirReader::open(other, store_path()).unwrap();
    assert_eq!(reader.num_parts(), 8);
    assert_eq!(read(&reader, "k1"), "v1");
    assert_eq!(read(&reader, "k2"), "v2");
}

// =============================================================================
// Misuse Tests
// =============================================================================

#[test]
fn test_append_to_wrong_epoch() {
    let writer = DirWriter::open(mem_options().build(), store_path()).unwrap();
    writer.append(b"k", b"v", 0).unwrap();
    assert!(matches!(
        writer.append(b"k", b"v", 1),
        Err(BurstError::InvalidArgument(_))
    ));

    writer.epoch_flush(0).unwrap();
    assert_eq!(writer.current_epoch(), 1);
    assert!(matches!(
        writer.append(b"k", b"v", 0),
        Err(BurstError::InvalidArgument(_))
    ));
    assert!(matches!(
        writer.epoch_flush(0),
        Err(BurstError::InvalidArgument(_))
    ));
    writer.append(b"k", b"v", 1).unwrap();
    writer.finish().unwrap();
}

#[test]
fn test_calls_after_finish_fail() {
    let writer = DirWriter::open(mem_options().build(), store_path()).unwrap();
    writer.append(b"k", b"v", 0).unwrap();
    writer.finish().unwrap();

    assert!(matches!(
        writer.append(b"k", b"v", 0),
        Err(BurstError::InvalidArgument(_))
    ));
    assert!(matches!(
        writer.epoch_flush(0),
        Err(BurstError::InvalidArgument(_))
    ));
    assert!(matches!(
        writer.finish(),
        Err(BurstError::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_options_rejected() {
    let too_many_parts = mem_options().lg_parts(13).build();
    assert!(matches!(
        DirWriter::open(too_many_parts, store_path()),
        Err(BurstError::Config(_))
    ));

    let bad_util = mem_options().block_util(1.5).build();
    assert!(matches!(
        DirWriter::open(bad_util, store_path()),
        Err(BurstError::Config(_))
    ));

    let tiny_budget = mem_options().lg_parts(4).total_memtable_budget(16).build();
    assert!(matches!(
        DirWriter::open(tiny_budget, store_path()),
        Err(BurstError::Config(_))
    ));
}

#[test]
fn test_open_reader_without_store() {
    let result = DirReader::open(mem_options().build(), Path::new("/missing"));
    assert!(matches!(result, Err(BurstError::NotFound(_))));
}

#[test]
fn test_unfinished_store_is_not_readable() {
    let options = mem_options().build();
    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    writer.append(b"k", b"v", 0).unwrap();
    writer.epoch_flush(0).unwrap();

    let result = DirReader::open(options, store_path());
    assert!(matches!(result, Err(BurstError::Corruption(_))));
    drop(writer);
}

// =============================================================================
// Scheduling Tests
// =============================================================================

fn scheduled_round_trip(builder: DirOptionsBuilder) -> Vec<Vec<u8>> {
    let options = builder
        .lg_parts(1)
        .total_memtable_budget(16 * 1024)
        .unique_keys(false)
        .build();
    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    for epoch in 0..3 {
        for i in 0..2000u32 {
            let key = format!("key{:04}", i % 500);
            let value = format!("[{}:{}]", epoch, i);
            writer.append(key.as_bytes(), value.as_bytes(), epoch).unwrap();
        }
        writer.epoch_flush(epoch).unwrap();
    }
    writer.finish().unwrap();
    assert!(writer.num_tables() > 6, "expected budget-driven seals");

    let reader = DirReader::open(options, store_path()).unwrap();
    (0..500)
        .map(|i| reader.read_all(format!("key{:04}", i).as_bytes()).unwrap())
        .collect()
}

#[test]
fn test_schedulers_agree() {
    let inline = scheduled_round_trip(mem_options().allow_env_threads(false));
    let ephemeral = scheduled_round_trip(mem_options().allow_env_threads(true));
    let pool = Arc::new(ThreadPool::new_fixed(3).unwrap());
    let pooled = scheduled_round_trip(mem_options().compaction_pool(pool));

    // Every value of a key, in epoch then insertion order
    let expected: Vec<u8> = (0..3)
        .flat_map(|epoch| {
            (0..4).map(move |round| format!("[{}:{}]", epoch, round * 500 + 7))
        })
        .collect::<String>()
        .into_bytes();
    assert_eq!(inline[7], expected);
    assert_eq!(inline, ephemeral);
    assert_eq!(inline, pooled);
}

#[test]
fn test_backpressure_with_tiny_budget() {
    let options = mem_options()
        .lg_parts(0)
        .total_memtable_budget(2048)
        .allow_env_threads(true)
        .build();
    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    for i in 0..5000u32 {
        writer
            .append(format!("key{:05}", i).as_bytes(), b"0123456789", 0)
            .unwrap();
    }
    writer.finish().unwrap();
    assert!(writer.num_tables() >= 5000 * 18 / 1024);

    let reader = DirReader::open(options, store_path()).unwrap();
    for i in (0..5000u32).step_by(13) {
        assert_eq!(read(&reader, &format!("key{:05}", i)), "0123456789");
    }
}

#[test]
fn test_concurrent_appends() {
    let pool = Arc::new(ThreadPool::new_fixed(2).unwrap());
    let options = mem_options()
        .lg_parts(3)
        .total_memtable_budget(64 * 1024)
        .compaction_pool(pool)
        .build();
    let writer = Arc::new(DirWriter::open(options.clone(), store_path()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let writer = Arc::clone(&writer);
            thread::spawn(move || {
                for i in 0..2000 {
                    let key = format!("t{}-{:05}", t, i);
                    writer.append(key.as_bytes(), key.as_bytes(), 0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    writer.epoch_flush(0).unwrap();
    writer.finish().unwrap();

    let reader = DirReader::open(options, store_path()).unwrap();
    for t in 0..4 {
        for i in (0..2000).step_by(7) {
            let key = format!("t{}-{:05}", t, i);
            assert_eq!(read(&reader, &key), key);
        }
    }
}

// =============================================================================
// Diagnostics Tests
// =============================================================================

#[test]
fn test_writer_diagnostics() {
    let options = mem_options().build();
    let writer = DirWriter::open(options.clone(), store_path()).unwrap();
    assert_eq!(writer.num_parts(), 4);
    assert_eq!(writer.estimated_table_size(), (1 << 20) / 8);
    assert!(writer.total_memory_usage() > 0);

    for i in 0..1000u32 {
        writer
            .append(format!("key{:04}", i).as_bytes(), b"value", 0)
            .unwrap();
    }
    writer.finish().unwrap();

    assert!(writer.num_tables() >= 1 && writer.num_tables() <= 4);
    assert!(writer.data_size() > 0);
    assert!(writer.index_size() > 0);
    assert!(writer.filter_size() > 0);

    let written = writer.io_stats();
    assert!(written.data_bytes > 0);
    assert!(written.data_ops > 0);
    assert!(written.index_bytes > 0);
    assert!(written.index_ops > 0);

    let reader = DirReader::open(options, store_path()).unwrap();
    assert_eq!(reader.num_tables(), writer.num_tables());
    assert_eq!(reader.io_stats().data_ops, 0);
    assert_eq!(read(&reader, "key0042"), "value");
    let stats = reader.io_stats();
    assert!(stats.data_ops >= 1);
    assert!(stats.index_ops >= 1);
}

// =============================================================================
// Filesystem Tests
// =============================================================================

fn local_options() -> DirOptions {
    DirOptions::builder()
        .backend(Arc::new(LocalBackend::new()))
        .lg_parts(1)
        .block_size(4096)
        .verify_checksums(true)
        .build()
}

#[test]
fn test_local_store_round_trip_and_destroy() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("plfs");
    let options = local_options();

    let writer = DirWriter::open(options.clone(), &path).unwrap();
    writer.append(b"k1", b"v1", 0).unwrap();
    writer.epoch_flush(0).unwrap();
    writer.append(b"k1", b"v2", 1).unwrap();
    writer.finish().unwrap();
    drop(writer);

    assert!(path.join("DIRECTORY").exists());
    assert!(path.join("part-0000.dat").exists());
    assert!(path.join("part-0001.idx").exists());

    let reader = DirReader::open(options.clone(), &path).unwrap();
    assert_eq!(read(&reader, "k1"), "v1v2");
    drop(reader);

    destroy_dir(&path, &options).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_reopen_truncates_previous_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("plfs");
    let options = local_options();

    let writer = DirWriter::open(options.clone(), &path).unwrap();
    writer.append(b"old", b"data", 0).unwrap();
    writer.finish().unwrap();
    drop(writer);

    let writer = DirWriter::open(options.clone(), &path).unwrap();
    writer.append(b"new", b"data", 0).unwrap();
    writer.finish().unwrap();
    drop(writer);

    let reader = DirReader::open(options, &path).unwrap();
    assert_eq!(read(&reader, "old"), "");
    assert_eq!(read(&reader, "new"), "data");
}
