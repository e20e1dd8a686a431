//! Tests for storage backends and the histogram
//!
//! These tests verify:
//! - In-memory files: append, positional reads, truncation, removal
//! - Local files: the same contract over a temp directory
//! - Short reads are corruption, missing files are not-found
//! - The throttled backend forwards bytes and records write gaps
//! - Histogram statistics

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use burstkv::backend::{Backend, LocalBackend, MemBackend, ThrottledBackend};
use burstkv::{BurstError, Histogram};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Backend-independent file contract
fn exercise(backend: &dyn Backend, dir: &Path) {
    backend.create_dir_all(dir).unwrap();
    assert!(backend.exists(dir));

    let path = dir.join("log");
    let mut file = backend.new_writable(&path).unwrap();
    file.append(b"hello ").unwrap();
    file.append(b"world").unwrap();
    file.sync().unwrap();
    assert_eq!(backend.file_size(&path).unwrap(), 11);

    let reader = backend.new_random_access(&path).unwrap();
    assert_eq!(reader.size().unwrap(), 11);
    assert_eq!(reader.read_at(6, 5).unwrap(), b"world".to_vec());
    assert_eq!(reader.read_at(0, 0).unwrap(), Vec::<u8>::new());
    assert!(reader.read_at(8, 10).unwrap_err().is_corruption());
    drop(reader);

    // Reopening for write truncates
    let mut file = backend.new_writable(&path).unwrap();
    file.append(b"x").unwrap();
    file.sync().unwrap();
    assert_eq!(backend.file_size(&path).unwrap(), 1);

    assert!(matches!(
        backend.new_random_access(&dir.join("missing")),
        Err(BurstError::NotFound(_))
    ));

    backend.remove_dir_all(dir).unwrap();
    assert!(!backend.exists(&path));
    // Removing again is fine
    backend.remove_dir_all(dir).unwrap();
}

// =============================================================================
// Backend Tests
// =============================================================================

#[test]
fn test_mem_backend_contract() {
    exercise(&MemBackend::new(), Path::new("/mem/dir"));
}

#[test]
fn test_local_backend_contract() {
    let temp = TempDir::new().unwrap();
    exercise(&LocalBackend::new(), &temp.path().join("dir"));
}

#[test]
fn test_mem_backend_accounting() {
    let backend = MemBackend::new();
    backend.create_dir_all(Path::new("/a")).unwrap();
    let mut one = backend.new_writable(Path::new("/a/one")).unwrap();
    let mut two = backend.new_writable(Path::new("/a/two")).unwrap();
    one.append(&[0u8; 100]).unwrap();
    two.append(&[0u8; 50]).unwrap();

    assert_eq!(backend.file_count(), 2);
    assert_eq!(backend.total_bytes(), 150);

    // Clones share the same files
    let clone = backend.clone();
    assert_eq!(clone.total_bytes(), 150);
}

#[test]
fn test_throttled_backend_records_write_gaps() {
    let inner = MemBackend::new();
    let throttled = ThrottledBackend::new(Arc::new(inner.clone()), 0);
    throttled.create_dir_all(Path::new("/t")).unwrap();

    let mut data = throttled.new_writable(Path::new("/t/part-0000.dat")).unwrap();
    for _ in 0..5 {
        data.append(b"0123456789").unwrap();
        std::thread::sleep(Duration::from_millis(2));
    }
    let mut index = throttled.new_writable(Path::new("/t/part-0000.idx")).unwrap();
    index.append(b"i").unwrap();

    assert_eq!(
        inner.file_size(Path::new("/t/part-0000.dat")).unwrap(),
        50
    );
    let hist = throttled.histogram(".dat").unwrap();
    assert_eq!(hist.count(), 4);
    assert!(hist.min() >= 1000.0, "gap below sleep: {}", hist.min());
    assert!(throttled.histogram(".log").is_none());
}

#[test]
fn test_throttled_backend_delays_appends() {
    let throttled = ThrottledBackend::new(Arc::new(MemBackend::new()), 100 * 1024);
    throttled.create_dir_all(Path::new("/t")).unwrap();
    let mut file = throttled.new_writable(Path::new("/t/f.dat")).unwrap();

    let start = std::time::Instant::now();
    file.append(&[0u8; 10 * 1024]).unwrap();
    // 10 KiB at 100 KiB/s
    assert!(start.elapsed() >= Duration::from_millis(90));
}

// =============================================================================
// Histogram Tests
// =============================================================================

#[test]
fn test_histogram_statistics() {
    let mut hist = Histogram::new();
    assert_eq!(hist.count(), 0);
    assert_eq!(hist.average(), 0.0);
    assert_eq!(hist.percentile(50.0), 0.0);

    for v in 1..=100 {
        hist.add(v as f64);
    }
    assert_eq!(hist.count(), 100);
    assert_eq!(hist.min(), 1.0);
    assert_eq!(hist.max(), 100.0);
    assert!((hist.average() - 50.5).abs() < 1e-9);

    let median = hist.median();
    assert!(median > 35.0 && median < 65.0, "median {}", median);
    let p99 = hist.percentile(99.0);
    assert!(p99 >= median && p99 <= 100.0);
}

#[test]
fn test_histogram_merge_and_clear() {
    let mut a = Histogram::new();
    let mut b = Histogram::new();
    a.add(1.0);
    b.add(9.0);
    b.add(5.0);

    a.merge(&b);
    assert_eq!(a.count(), 3);
    assert_eq!(a.min(), 1.0);
    assert_eq!(a.max(), 9.0);
    assert!((a.average() - 5.0).abs() < 1e-9);

    a.clear();
    assert_eq!(a.count(), 0);
    assert_eq!(a.min(), 0.0);
}
