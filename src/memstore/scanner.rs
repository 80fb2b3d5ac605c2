//! MemStore scanners
//!
//! Forward and reverse iteration over the merged live and snapshot sets at
//! a frozen MVCC read point.
//!
//! ## Creation-time capture
//! A scanner captures the set and allocator references current at
//! construction. A later snapshot swap on the MemStore does not affect the
//! scanner; writes landing in the replacement live set are invisible to it.
//! The enclosing store re-opens scanners at flush boundaries.

use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;

use crate::cell::{compare, compare_rows, Cell};
use crate::memstore::allocator::SlabAllocator;
use crate::memstore::cellset::CellSet;
use crate::memstore::timerange::{TimeRange, TimeRangeTracker};

/// Scanner contract consumed by the merge layer above the store.
///
/// Forward iteration is `seek`/`reseek`/`peek`/`next`; reverse iteration is
/// `backward_seek`/`seek_to_previous_row`/`seek_to_last_row`. A scanner
/// moves Fresh → Seeked → Exhausted → Closed; `reseek` is meaningful only
/// after a successful seek, and every operation on a closed scanner is a
/// no-op.
pub trait CellScanner {
    /// Positions the scanner at the first visible cell `>= key`. Returns
    /// false if there is no such cell.
    fn seek(&mut self, key: &Cell) -> bool;

    /// Re-positions at `key` without regressing past cells already
    /// iterated. Tolerates concurrent mutation of the underlying sets.
    fn reseek(&mut self, key: &Cell) -> bool;

    /// The cell `next` would return, without advancing
    fn peek(&self) -> Option<&Cell>;

    /// Returns the current head and advances past it
    fn next(&mut self) -> Option<Cell>;

    /// Seeks to `key`, falling back to the previous row when nothing
    /// visible remains on `key`'s row
    fn backward_seek(&mut self, key: &Cell) -> bool;

    /// Positions at the first visible cell of the row preceding `key`'s row
    fn seek_to_previous_row(&mut self, key: &Cell) -> bool;

    /// Positions at the first visible cell of the last row
    fn seek_to_last_row(&mut self) -> bool;

    /// Ordering key against other scanners in a merge
    fn sequence_id(&self) -> u64;

    /// Cheap prune: false if this scanner cannot contain cells matching the
    /// scan's time range
    fn should_use(&self, range: &TimeRange, oldest_unexpired_ts: u64) -> bool;

    /// Releases iterator state and allocator references. Idempotent.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScannerState {
    Fresh,
    Seeked,
    Exhausted,
    Closed,
}

#[derive(Clone, Copy)]
enum Side {
    Live,
    Snapshot,
}

/// Cursor over one creation-time cell set.
///
/// Position is re-derived from the set on every fetch, so the walk stays
/// valid while writers mutate the set underneath; a concurrent insert ahead
/// of the cursor may or may not be observed, matching the backing set's
/// weak iteration consistency.
struct SideIter {
    set: Arc<CellSet>,
    from: Option<Cell>,
    from_inclusive: bool,
    /// Last cell the underlying walk reached, whether or not it passed the
    /// read-point filter; reseek resumes from here
    last_fetched: Option<Cell>,
}

impl SideIter {
    fn new(set: Arc<CellSet>) -> Self {
        Self {
            set,
            from: None,
            from_inclusive: false,
            last_fetched: None,
        }
    }

    fn cells(&self) -> &CellSet {
        &self.set
    }

    fn seek_to(&mut self, key: &Cell) {
        self.from = Some(key.clone());
        self.from_inclusive = true;
        self.last_fetched = None;
    }

    /// Resumes at the greater of `key` and the last cell reached, so a
    /// reseek never regresses even if the set changed underneath
    fn restore_to(&mut self, key: &Cell) {
        let start = match &self.last_fetched {
            Some(last) if compare(last, key) == CmpOrdering::Greater => last.clone(),
            _ => key.clone(),
        };
        self.from = Some(start);
        self.from_inclusive = true;
    }

    fn fetch(&mut self) -> Option<Cell> {
        let from = self.from.as_ref()?;
        let next = if self.from_inclusive {
            self.set.first_at_or_above(from)
        } else {
            self.set.first_above(from)
        }?;
        self.from = Some(next.clone());
        self.from_inclusive = false;
        self.last_fetched = Some(next.clone());
        Some(next)
    }
}

/// Scanner over (live ∪ snapshot) at a fixed MVCC read point.
///
/// Only cells with `mvcc <= read_point` are emitted. Within a column, cells
/// come out newest-timestamp first with tombstones leading puts at equal
/// timestamp.
pub struct MemStoreScanner {
    live: SideIter,
    snapshot: SideIter,

    live_allocator: Option<Arc<SlabAllocator>>,
    snapshot_allocator: Option<Arc<SlabAllocator>>,

    live_time_range: Arc<TimeRangeTracker>,
    snapshot_time_range: Arc<TimeRangeTracker>,

    /// Heads that already passed the read-point filter
    live_next: Option<Cell>,
    snapshot_next: Option<Cell>,

    /// Pre-computed merged head returned by `peek`/`next`
    the_next: Option<Cell>,

    read_point: u64,

    /// Reverse-seek guard: while set, the mvcc filter stops instead of
    /// crossing into the row after the one the reverse seek started on
    stop_if_next_row: bool,

    state: ScannerState,
}

impl MemStoreScanner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        live: Arc<CellSet>,
        snapshot: Arc<CellSet>,
        live_allocator: Option<Arc<SlabAllocator>>,
        snapshot_allocator: Option<Arc<SlabAllocator>>,
        live_time_range: Arc<TimeRangeTracker>,
        snapshot_time_range: Arc<TimeRangeTracker>,
        read_point: u64,
    ) -> Self {
        if let Some(allocator) = &live_allocator {
            allocator.inc_scanner_count();
        }
        if let Some(allocator) = &snapshot_allocator {
            allocator.inc_scanner_count();
        }
        Self {
            live: SideIter::new(live),
            snapshot: SideIter::new(snapshot),
            live_allocator,
            snapshot_allocator,
            live_time_range,
            snapshot_time_range,
            live_next: None,
            snapshot_next: None,
            the_next: None,
            read_point,
            stop_if_next_row: false,
            state: ScannerState::Fresh,
        }
    }

    /// The MVCC read point this scanner was created at
    pub fn read_point(&self) -> u64 {
        self.read_point
    }

    /// Advances one side's cursor past cells newer than the read point.
    /// In reverse mode the skip stops at the first cell whose row sorts
    /// after the row the reverse seek started on.
    fn get_next(&mut self, side: Side) -> Option<Cell> {
        let read_point = self.read_point;
        let stop_if_next_row = self.stop_if_next_row;
        let start = self.the_next.clone();
        let it = match side {
            Side::Live => &mut self.live,
            Side::Snapshot => &mut self.snapshot,
        };
        while let Some(cell) = it.fetch() {
            if cell.mvcc() <= read_point {
                return Some(cell);
            }
            if stop_if_next_row {
                if let Some(start) = &start {
                    if compare_rows(&cell, start) == CmpOrdering::Greater {
                        return None;
                    }
                }
            }
        }
        None
    }

    /// Primes both heads and the merged head after a seek or reseek
    fn seek_in_sets(&mut self) -> bool {
        self.live_next = self.get_next(Side::Live);
        self.snapshot_next = self.get_next(Side::Snapshot);
        self.the_next = lowest(self.live_next.as_ref(), self.snapshot_next.as_ref()).cloned();
        self.state = if self.the_next.is_some() {
            ScannerState::Seeked
        } else {
            ScannerState::Exhausted
        };
        self.the_next.is_some()
    }
}

impl CellScanner for MemStoreScanner {
    fn seek(&mut self, key: &Cell) -> bool {
        if self.state == ScannerState::Closed {
            return false;
        }
        self.live.seek_to(key);
        self.snapshot.seek_to(key);
        self.seek_in_sets()
    }

    fn reseek(&mut self, key: &Cell) -> bool {
        if self.state == ScannerState::Closed {
            return false;
        }
        // Concurrent puts and at most one snapshot swap may have run since
        // the last seek; the creation-time set references are stable, so
        // each side resumes from the furthest point it already reached.
        self.live.restore_to(key);
        self.snapshot.restore_to(key);
        self.seek_in_sets()
    }

    fn peek(&self) -> Option<&Cell> {
        self.the_next.as_ref()
    }

    fn next(&mut self) -> Option<Cell> {
        let ret = self.the_next.clone()?;

        // Advance the side that produced the head, then re-merge.
        if self.the_next == self.live_next {
            self.live_next = self.get_next(Side::Live);
        } else {
            self.snapshot_next = self.get_next(Side::Snapshot);
        }
        self.the_next = lowest(self.live_next.as_ref(), self.snapshot_next.as_ref()).cloned();
        if self.the_next.is_none() {
            self.state = ScannerState::Exhausted;
        }
        Some(ret)
    }

    fn backward_seek(&mut self, key: &Cell) -> bool {
        if self.state == ScannerState::Closed {
            return false;
        }
        self.seek(key);
        let on_requested_row = self
            .the_next
            .as_ref()
            .is_some_and(|head| compare_rows(head, key) != CmpOrdering::Greater);
        if on_requested_row {
            true
        } else {
            self.seek_to_previous_row(key)
        }
    }

    fn seek_to_previous_row(&mut self, key: &Cell) -> bool {
        if self.state == ScannerState::Closed {
            return false;
        }
        let mut target = key.clone();
        loop {
            let first_on_row = Cell::first_on_row(target.row().clone());

            // The closer (larger) of the two last cells before the row.
            let live_before = self.live.cells().last_below(&first_on_row);
            let snapshot_before = self.snapshot.cells().last_below(&first_on_row);
            let before = match highest(live_before.as_ref(), snapshot_before.as_ref()) {
                Some(cell) => cell.clone(),
                None => {
                    self.the_next = None;
                    self.state = ScannerState::Exhausted;
                    return false;
                }
            };

            let first_on_previous = Cell::first_on_row(before.row().clone());
            self.stop_if_next_row = true;
            self.seek(&first_on_previous);
            self.stop_if_next_row = false;

            // If mvcc filtering pushed the head past the previous row, back
            // up one more row.
            match &self.the_next {
                Some(head) if compare_rows(head, &first_on_previous) != CmpOrdering::Greater => {
                    return true;
                }
                _ => target = before,
            }
        }
    }

    fn seek_to_last_row(&mut self) -> bool {
        if self.state == ScannerState::Closed {
            return false;
        }
        let live_last = self.live.cells().last();
        let snapshot_last = self.snapshot.cells().last();
        let higher = match highest(live_last.as_ref(), snapshot_last.as_ref()) {
            Some(cell) => cell.clone(),
            None => return false,
        };
        let first_on_last_row = Cell::first_on_row(higher.row().clone());
        if self.seek(&first_on_last_row) {
            true
        } else {
            self.seek_to_previous_row(&higher)
        }
    }

    /// The memstore always holds the freshest data, so its scanner orders
    /// above every on-disk scanner in a merge
    fn sequence_id(&self) -> u64 {
        u64::MAX
    }

    fn should_use(&self, range: &TimeRange, oldest_unexpired_ts: u64) -> bool {
        (self.live_time_range.includes_range(range)
            || self.snapshot_time_range.includes_range(range))
            && self
                .live_time_range
                .max_timestamp()
                .max(self.snapshot_time_range.max_timestamp())
                >= oldest_unexpired_ts
    }

    fn close(&mut self) {
        if self.state == ScannerState::Closed {
            return;
        }
        self.state = ScannerState::Closed;
        self.the_next = None;
        self.live_next = None;
        self.snapshot_next = None;
        if let Some(allocator) = self.live_allocator.take() {
            allocator.dec_scanner_count();
        }
        if let Some(allocator) = self.snapshot_allocator.take() {
            allocator.dec_scanner_count();
        }
    }
}

impl Drop for MemStoreScanner {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read-only ordered iterator over a frozen snapshot set, carried by the
/// snapshot descriptor for the flusher to drain.
pub struct SnapshotScanner {
    set: Arc<CellSet>,
    cursor: Option<Cell>,
}

impl SnapshotScanner {
    pub(crate) fn new(set: Arc<CellSet>) -> Self {
        Self { set, cursor: None }
    }

    /// The cell `next` would return, without advancing
    pub fn peek(&self) -> Option<Cell> {
        match &self.cursor {
            None => self.set.first(),
            Some(cell) => self.set.first_above(cell),
        }
    }
}

impl Iterator for SnapshotScanner {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        let next = self.peek()?;
        self.cursor = Some(next.clone());
        Some(next)
    }
}

/// Lower of two optional cells under the full comparator; ties go to `a`
fn lowest<'a>(a: Option<&'a Cell>, b: Option<&'a Cell>) -> Option<&'a Cell> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if compare(x, y) != CmpOrdering::Greater {
                Some(x)
            } else {
                Some(y)
            }
        }
        (x, y) => x.or(y),
    }
}

/// Higher of two optional cells under the full comparator; ties go to `b`
fn highest<'a>(a: Option<&'a Cell>, b: Option<&'a Cell>) -> Option<&'a Cell> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if compare(x, y) == CmpOrdering::Greater {
                Some(x)
            } else {
                Some(y)
            }
        }
        (x, y) => x.or(y),
    }
}
