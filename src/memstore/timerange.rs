//! Timestamp range tracking
//!
//! Each cell set carries a tracker covering the timestamps of its contents,
//! letting scans skip a memstore whose data cannot match their time range.

use std::sync::atomic::{AtomicU64, Ordering};

/// Inclusive `[min, max]` timestamp interval carried by a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    min: u64,
    max: u64,
}

impl TimeRange {
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Range covering every possible timestamp
    pub fn all_time() -> Self {
        Self {
            min: 0,
            max: u64::MAX,
        }
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::all_time()
    }
}

/// Tracks the `[min, max]` timestamps observed in one cell set.
///
/// Updates are lock-free so concurrent writers can fold their timestamps in
/// without serialising. The tracker only ever widens; it is replaced, not
/// narrowed, when its set is swapped out.
#[derive(Debug)]
pub struct TimeRangeTracker {
    min: AtomicU64,
    max: AtomicU64,
}

impl TimeRangeTracker {
    /// Creates an empty tracker that overlaps no range
    pub fn new() -> Self {
        Self {
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
        }
    }

    /// Widens the tracked interval to cover `timestamp`
    pub fn include_timestamp(&self, timestamp: u64) {
        self.min.fetch_min(timestamp, Ordering::Relaxed);
        self.max.fetch_max(timestamp, Ordering::Relaxed);
    }

    /// True if the tracked interval overlaps `range`. An empty tracker
    /// overlaps nothing.
    pub fn includes_range(&self, range: &TimeRange) -> bool {
        self.min.load(Ordering::Relaxed) <= range.max()
            && self.max.load(Ordering::Relaxed) >= range.min()
    }

    /// Smallest timestamp seen; `u64::MAX` when empty
    pub fn min_timestamp(&self) -> u64 {
        self.min.load(Ordering::Relaxed)
    }

    /// Largest timestamp seen; 0 when empty
    pub fn max_timestamp(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// True until the first timestamp is included
    pub fn is_empty(&self) -> bool {
        self.min.load(Ordering::Relaxed) > self.max.load(Ordering::Relaxed)
    }
}

impl Default for TimeRangeTracker {
    fn default() -> Self {
        Self::new()
    }
}
