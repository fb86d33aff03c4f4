//! Request accounting for store backends
//!
//! Every backend counts the requests it serves so that a pipeline run can
//! report how much work it did against the object store and what that work
//! would cost on a pay-per-request service.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Dollars per 1000 list requests.
pub const LIST_COST_PER_1000: f64 = 0.005;
/// Dollars per 1000 read requests.
pub const READ_COST_PER_1000: f64 = 0.004;
/// Dollars per 1000 write requests.
pub const WRITE_COST_PER_1000: f64 = 0.005;

/// Lock-free request counters.
#[derive(Debug, Default)]
pub struct StoreStatistics {
    list_count: AtomicU64,
    read_count: AtomicU64,
    write_count: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    throttled_count: AtomicU64,
}

impl StoreStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_list(&self) {
        self.list_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read(&self, bytes: u64) {
        self.read_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write(&self, bytes: u64) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_throttle(&self) {
        self.throttled_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            list_count: self.list_count.load(Ordering::Relaxed),
            read_count: self.read_count.load(Ordering::Relaxed),
            write_count: self.write_count.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            throttled_count: self.throttled_count.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.list_count.store(0, Ordering::Relaxed);
        self.read_count.store(0, Ordering::Relaxed);
        self.write_count.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.throttled_count.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`StoreStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub list_count: u64,
    pub read_count: u64,
    pub write_count: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub throttled_count: u64,
}

impl StatsSnapshot {
    /// Request cost in dollars.
    pub fn cost(&self) -> f64 {
        (self.list_count as f64 / 1000.0) * LIST_COST_PER_1000
            + (self.read_count as f64 / 1000.0) * READ_COST_PER_1000
            + (self.write_count as f64 / 1000.0) * WRITE_COST_PER_1000
    }

    /// Combine two snapshots, e.g. one per table.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            list_count: self.list_count + other.list_count,
            read_count: self.read_count + other.read_count,
            write_count: self.write_count + other.write_count,
            bytes_read: self.bytes_read + other.bytes_read,
            bytes_written: self.bytes_written + other.bytes_written,
            throttled_count: self.throttled_count + other.throttled_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = StoreStatistics::new();
        stats.record_list();
        stats.record_read(100);
        stats.record_read(50);
        stats.record_write(10);
        stats.record_throttle();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.list_count, 1);
        assert_eq!(snapshot.read_count, 2);
        assert_eq!(snapshot.bytes_read, 150);
        assert_eq!(snapshot.write_count, 1);
        assert_eq!(snapshot.bytes_written, 10);
        assert_eq!(snapshot.throttled_count, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_cost() {
        let snapshot = StatsSnapshot {
            list_count: 1000,
            read_count: 2000,
            write_count: 3000,
            ..StatsSnapshot::default()
        };
        let expected = 0.005 + 0.008 + 0.015;
        assert!((snapshot.cost() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_merge() {
        let a = StatsSnapshot {
            read_count: 1,
            bytes_read: 7,
            ..StatsSnapshot::default()
        };
        let b = StatsSnapshot {
            read_count: 2,
            write_count: 4,
            ..StatsSnapshot::default()
        };
        let merged = a.merge(b);
        assert_eq!(merged.read_count, 3);
        assert_eq!(merged.write_count, 4);
        assert_eq!(merged.bytes_read, 7);
    }
}
