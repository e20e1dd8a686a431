//! Tests for blocks, bloom filters and the partitioner
//!
//! These tests verify:
//! - Block round trip across restart points
//! - Seeking inside a block, including runs of equal keys
//! - Truncated blocks are rejected as corruption
//! - Bloom filters never report false negatives and stay selective
//! - Disabled or empty filters admit every key
//! - Partition assignment is stable and in range

use burstkv::filter::{bloom_may_match, BloomBuilder};
use burstkv::partition::{xxhash32, Partitioner};
use burstkv::storage::{Block, BlockBuilder};

// =============================================================================
// Helper Functions
// =============================================================================

fn key(i: usize) -> Vec<u8> {
    format!("key{:06}", i).into_bytes()
}

fn build_block(entries: &[(Vec<u8>, Vec<u8>)]) -> Block {
    let mut builder = BlockBuilder::new();
    for (k, v) in entries {
        builder.add(k, v);
    }
    Block::new(builder.finish()).unwrap()
}

fn numbered(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..count)
        .map(|i| (key(i), format!("value{}", i).into_bytes()))
        .collect()
}

// =============================================================================
// Block Tests
// =============================================================================

#[test]
fn test_block_round_trip() {
    let entries = numbered(100);
    let block = build_block(&entries);

    let mut iter = block.iter();
    iter.seek_to_first().unwrap();
    for (k, v) in &entries {
        assert!(iter.valid());
        assert_eq!(iter.key(), k.as_slice());
        assert_eq!(iter.value(), v.as_slice());
        iter.next().unwrap();
    }
    assert!(!iter.valid());
}

#[test]
fn test_empty_block() {
    let mut builder = BlockBuilder::new();
    assert!(builder.is_empty());
    let block = Block::new(builder.finish()).unwrap();

    let mut iter = block.iter();
    iter.seek_to_first().unwrap();
    assert!(!iter.valid());
    iter.seek(b"anything").unwrap();
    assert!(!iter.valid());
}

#[test]
fn test_builder_resets_after_finish() {
    let mut builder = BlockBuilder::new();
    builder.add(b"a", b"1");
    assert_eq!(builder.entry_count(), 1);
    assert_eq!(builder.last_key(), b"a");
    let _ = builder.finish();
    assert!(builder.is_empty());
    assert_eq!(builder.entry_count(), 0);
}

#[test]
fn test_block_seek() {
    let entries: Vec<_> = (0..200)
        .step_by(2)
        .map(|i| (key(i), b"v".to_vec()))
        .collect();
    let block = build_block(&entries);
    let mut iter = block.iter();

    iter.seek(&key(50)).unwrap();
    assert_eq!(iter.key(), key(50).as_slice());

    iter.seek(&key(51)).unwrap();
    assert_eq!(iter.key(), key(52).as_slice());

    iter.seek(b"").unwrap();
    assert_eq!(iter.key(), key(0).as_slice());

    iter.seek(&key(500)).unwrap();
    assert!(!iter.valid());
}

#[test]
fn test_block_seek_enters_equal_run_at_first_entry() {
    // 40 copies of one key straddle two restart points
    let mut entries = vec![(b"a".to_vec(), b"first".to_vec())];
    for i in 0..40 {
        entries.push((b"m".to_vec(), format!("{:02}", i).into_bytes()));
    }
    entries.push((b"z".to_vec(), b"last".to_vec()));
    let block = build_block(&entries);

    let mut iter = block.iter();
    iter.seek(b"m").unwrap();
    let mut seen = Vec::new();
    while iter.valid() && iter.key() == b"m" {
        seen.push(String::from_utf8(iter.value().to_vec()).unwrap());
        iter.next().unwrap();
    }
    let expected: Vec<String> = (0..40).map(|i| format!("{:02}", i)).collect();
    assert_eq!(seen, expected);
    assert_eq!(iter.key(), b"z");
}

#[test]
fn test_truncated_block_is_corruption() {
    let mut builder = BlockBuilder::new();
    builder.add(b"k", b"v");
    let data = builder.finish();

    let err = Block::new(data[..2].to_vec()).unwrap_err();
    assert!(err.is_corruption());
}

// =============================================================================
// Bloom Filter Tests
// =============================================================================

#[test]
fn test_bloom_has_no_false_negatives() {
    let mut builder = BloomBuilder::new(10);
    for i in 0..10_000 {
        builder.add(&key(i));
    }
    assert_eq!(builder.num_keys(), 10_000);
    let filter = builder.finish();

    for i in 0..10_000 {
        assert!(bloom_may_match(&key(i), &filter), "missing key {}", i);
    }
}

#[test]
fn test_bloom_false_positive_rate() {
    let mut builder = BloomBuilder::new(10);
    for i in 0..10_000 {
        builder.add(&key(i));
    }
    let filter = builder.finish();

    let false_positives = (10_000..20_000)
        .filter(|&i| bloom_may_match(&key(i), &filter))
        .count();
    // ~1% expected at 10 bits per key
    assert!(
        false_positives < 300,
        "false positive rate too high: {}",
        false_positives
    );
}

#[test]
fn test_bloom_builder_resets_between_fragments() {
    let mut builder = BloomBuilder::new(10);
    builder.add(b"first");
    let _ = builder.finish();
    assert_eq!(builder.num_keys(), 0);

    builder.add(b"second");
    let filter = builder.finish();
    assert!(bloom_may_match(b"second", &filter));
}

#[test]
fn test_disabled_bloom_admits_everything() {
    let mut builder = BloomBuilder::new(0);
    assert!(!builder.is_enabled());
    builder.add(b"key");
    let filter = builder.finish();
    assert!(filter.is_empty());
    assert!(bloom_may_match(b"key", &filter));
    assert!(bloom_may_match(b"other", &filter));
}

// =============================================================================
// Partitioner Tests
// =============================================================================

#[test]
fn test_partitioner_is_deterministic() {
    let a = Partitioner::new(4);
    let b = Partitioner::new(4);
    for i in 0..1000 {
        let p = a.partition_of(&key(i));
        assert!(p < 16);
        assert_eq!(p, b.partition_of(&key(i)));
    }
}

#[test]
fn test_partitioner_spreads_keys() {
    let partitioner = Partitioner::new(3);
    let mut counts = [0usize; 8];
    for i in 0..8000 {
        counts[partitioner.partition_of(&key(i))] += 1;
    }
    for count in counts {
        assert!(count > 500, "unbalanced partitions: {:?}", counts);
    }
}

#[test]
fn test_single_partition() {
    let partitioner = Partitioner::new(0);
    assert_eq!(partitioner.num_parts(), 1);
    assert_eq!(partitioner.partition_of(b"anything"), 0);
}

#[test]
fn test_xxhash32_known_values() {
    // Reference values of xxHash32 with seed 0
    assert_eq!(xxhash32(b"", 0), 0x02cc5d05);
    assert_eq!(xxhash32(b"a", 0), 0x550d7456);
}
