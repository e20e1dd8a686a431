//! Metrics
//!
//! I/O accounting shared by writers and readers, plus a bucketed histogram
//! used by the throttled backend and the bench binary. Both are explicit
//! objects handed to whoever records into them; nothing here is global.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

// =============================================================================
// I/O Accounting
// =============================================================================

/// Point-in-time copy of the I/O counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStats {
    /// Bytes moved on data logs
    pub data_bytes: u64,
    /// Physical operations on data logs
    pub data_ops: u64,
    /// Bytes moved on index logs
    pub index_bytes: u64,
    /// Physical operations on index logs
    pub index_ops: u64,
}

/// Monotonic I/O counters, updated lock-free.
///
/// All counters use `Ordering::Relaxed`; they are observability only.
#[derive(Debug, Default)]
pub struct IoCounters {
    data_bytes: AtomicU64,
    data_ops: AtomicU64,
    index_bytes: AtomicU64,
    index_ops: AtomicU64,
}

impl IoCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one physical operation on a data log
    pub fn record_data(&self, bytes: usize) {
        self.data_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.data_ops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one physical operation on an index log
    pub fn record_index(&self, bytes: usize) {
        self.index_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.index_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IoStats {
        IoStats {
            data_bytes: self.data_bytes.load(Ordering::Relaxed),
            data_ops: self.data_ops.load(Ordering::Relaxed),
            index_bytes: self.index_bytes.load(Ordering::Relaxed),
            index_ops: self.index_ops.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Histogram
// =============================================================================

fn bucket_limits() -> &'static [f64] {
    static LIMITS: OnceLock<Vec<f64>> = OnceLock::new();
    LIMITS.get_or_init(|| {
        let mut limits = Vec::new();
        let mut v = 1.0f64;
        while v < 1e20 {
            limits.push(v);
            v = (v * 1.2).ceil();
        }
        limits.push(f64::MAX);
        limits
    })
}

/// Bucketed histogram with exponentially growing bucket limits
#[derive(Debug, Clone)]
pub struct Histogram {
    min: f64,
    max: f64,
    num: f64,
    sum: f64,
    buckets: Vec<f64>,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            min: f64::MAX,
            max: 0.0,
            num: 0.0,
            sum: 0.0,
            buckets: vec![0.0; bucket_limits().len()],
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn add(&mut self, value: f64) {
        let limits = bucket_limits();
        let b = limits
            .iter()
            .position(|&limit| value < limit)
            .unwrap_or(limits.len() - 1);
        self.buckets[b] += 1.0;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.num += 1.0;
        self.sum += value;
    }

    pub fn merge(&mut self, other: &Histogram) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.num += other.num;
        self.sum += other.sum;
        for (mine, theirs) in self.buckets.iter_mut().zip(&other.buckets) {
            *mine += theirs;
        }
    }

    pub fn count(&self) -> u64 {
        self.num as u64
    }

    pub fn min(&self) -> f64 {
        if self.num == 0.0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn average(&self) -> f64 {
        if self.num == 0.0 {
            0.0
        } else {
            self.sum / self.num
        }
    }

    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Interpolated value below which `p` percent of samples fall
    pub fn percentile(&self, p: f64) -> f64 {
        if self.num == 0.0 {
            return 0.0;
        }
        let limits = bucket_limits();
        let threshold = self.num * (p / 100.0);
        let mut sum = 0.0;
        for (b, &count) in self.buckets.iter().enumerate() {
            sum += count;
            if sum >= threshold && count > 0.0 {
                let left = if b == 0 { 0.0 } else { limits[b - 1] };
                let right = limits[b];
                let pos = (threshold - (sum - count)) / count;
                let r = left + (right - left) * pos;
                return r.clamp(self.min, self.max);
            }
        }
        self.max
    }
}
