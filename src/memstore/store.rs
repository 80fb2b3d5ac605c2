//! MemStore core
//!
//! The live cell set plus the frozen snapshot, with the snapshot/clear
//! handoff protocol and heap-size accounting.
//!
//! Writes (`add`, `delete`, `upsert`, `rollback`) are called under the
//! enclosing store's read lock; `snapshot` and `clear_snapshot` under its
//! write lock. The same discipline is mirrored internally by `inner`, so
//! writers share a read guard and only the snapshot swap excludes them.

use std::cmp::Ordering as CmpOrdering;
use std::mem;
use std::mem::size_of;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cell::{compare_rows, Cell, CellType};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Result, StrataError};
use crate::memstore::allocator::SlabAllocator;
use crate::memstore::cellset::CellSet;
use crate::memstore::scanner::{MemStoreScanner, SnapshotScanner};
use crate::memstore::timerange::{TimeRange, TimeRangeTracker};

/// Shallow footprint of the MemStore struct itself
pub const FIXED_OVERHEAD: u64 = size_of::<MemStore>() as u64;

/// Footprint of an empty MemStore: the struct plus its two cell sets and
/// two time-range trackers. `heap_size` starts here and returns here after
/// every snapshot/clear cycle.
pub const DEEP_OVERHEAD: u64 =
    FIXED_OVERHEAD + 2 * (size_of::<CellSet>() as u64 + size_of::<TimeRangeTracker>() as u64);

/// Approximate skip-list node footprint charged per stored cell: entry
/// refcounts plus the average pointer tower.
pub const CELL_SET_ENTRY_OVERHEAD: u64 = 48;

/// Swappable references: the live set accepting writes, the frozen snapshot
/// awaiting flush, and their paired allocators and time-range trackers.
struct MemStoreInner {
    live: Arc<CellSet>,
    snapshot: Arc<CellSet>,
    live_allocator: Option<Arc<SlabAllocator>>,
    snapshot_allocator: Option<Arc<SlabAllocator>>,
    live_time_range: Arc<TimeRangeTracker>,
    snapshot_time_range: Arc<TimeRangeTracker>,
}

/// Descriptor of a frozen snapshot, handed to the flusher.
///
/// The scanner iterates the frozen set in comparator order and stays valid
/// until `clear_snapshot` for the matching id has been called **and** the
/// scanner itself is dropped.
pub struct MemStoreSnapshot {
    pub id: i64,
    pub cell_count: usize,
    pub byte_size: u64,
    pub time_range: Arc<TimeRangeTracker>,
    pub scanner: SnapshotScanner,
}

/// Row-tracking state consumed by [`MemStore::row_key_at_or_before`].
///
/// The tracker accumulates delete markers and the best candidate row while
/// the memstore walks forward within a row and backwards a row at a time.
pub trait ClosestRowTracker {
    /// First possible cell on the target row
    fn target_key(&self) -> Cell;

    /// True once `cell` lies beyond the row started at `first_on_row`
    fn is_too_far(&self, cell: &Cell, first_on_row: &Cell) -> bool;

    /// Expired cells are removed from the set as the walk passes them
    fn is_expired(&self, cell: &Cell) -> bool;

    /// False once the walk has backed out of the target table
    fn is_target_table(&self, cell: &Cell) -> bool;

    /// False once no earlier row can beat the candidate already held
    fn is_better_candidate(&self, cell: &Cell) -> bool;

    /// Offers `cell` to the tracker; true if it was accepted as a candidate
    fn handle(&mut self, cell: &Cell) -> bool;
}

/// In-memory write buffer for one column family.
///
/// Holds edits in an ordered, concurrent cell set and serves reads merged
/// with the frozen snapshot. When asked to flush, the live set is moved to
/// the snapshot slot and a fresh one takes its place; the snapshot is let go
/// once the flusher confirms with [`MemStore::clear_snapshot`].
pub struct MemStore {
    inner: RwLock<MemStoreInner>,

    /// Estimated heap footprint of the live set only
    heap_size: AtomicU64,

    /// Bytes frozen at the moment of the last `snapshot()`
    snapshot_size: AtomicU64,

    /// Id of the outstanding snapshot; -1 when none
    snapshot_id: AtomicI64,

    /// Wall-clock time of the oldest edit in the live set; `u64::MAX` when
    /// the live set has seen no edit since the last snapshot
    time_of_oldest_edit: AtomicU64,

    config: Config,
    clock: Arc<dyn Clock>,
}

impl MemStore {
    /// Creates a MemStore on the system clock
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a MemStore with an injected clock (used by tests)
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let live_allocator = config
            .use_slab_allocator
            .then(|| Arc::new(SlabAllocator::new(&config)));
        Self {
            inner: RwLock::new(MemStoreInner {
                live: Arc::new(CellSet::new()),
                snapshot: Arc::new(CellSet::new()),
                live_allocator,
                snapshot_allocator: None,
                live_time_range: Arc::new(TimeRangeTracker::new()),
                snapshot_time_range: Arc::new(TimeRangeTracker::new()),
            }),
            heap_size: AtomicU64::new(DEEP_OVERHEAD),
            snapshot_size: AtomicU64::new(0),
            snapshot_id: AtomicI64::new(-1),
            time_of_oldest_edit: AtomicU64::new(u64::MAX),
            config,
            clock,
        }
    }

    // -------------------------------------------------------------------------
    // Write Path
    // -------------------------------------------------------------------------

    /// Writes an update. Returns the heap-size delta: the per-entry overhead
    /// plus the cell's heap size if it was newly inserted, zero if an
    /// identical cell was already present.
    pub fn add(&self, cell: Cell) -> i64 {
        let inner = self.inner.read();
        let to_add = Self::maybe_clone_with_allocator(&inner, cell);
        self.internal_add(&inner, to_add)
    }

    /// Writes a tombstone. The cell's type tag marks it as a delete; it
    /// coexists with the puts it masks until the merge layer above resolves
    /// them. Returns the heap-size delta.
    pub fn delete(&self, cell: Cell) -> i64 {
        debug_assert!(cell.is_delete(), "delete called with a non-tombstone cell");
        let inner = self.inner.read();
        let to_add = Self::maybe_clone_with_allocator(&inner, cell);
        self.internal_add(&inner, to_add)
    }

    /// Inserts each cell and collapses older visible Put versions of the
    /// same column.
    ///
    /// For every input cell, after insertion the live set is walked forward
    /// from the column's seek sentinel: the first existing Put with
    /// `mvcc <= read_point` is kept (the oldest live scanner may still need
    /// it) and every further one is removed. The walk stops at the first
    /// cell outside the column. Returns the net heap-size delta.
    ///
    /// Upsert cells are never routed through the slab allocator: hot-counter
    /// churn would fill chunks faster than flushes reclaim them, so these
    /// cells keep their own buffers and removal frees memory immediately.
    pub fn upsert(&self, cells: &[Cell], read_point: u64) -> i64 {
        let inner = self.inner.read();
        let mut delta = 0;
        for cell in cells {
            delta += self.upsert_one(&inner, cell.clone(), read_point);
        }
        delta
    }

    /// Removes `cell` from the snapshot and the live set, requiring an exact
    /// mvcc match on the stored element. Heap size is adjusted only for the
    /// live removal; the snapshot is not part of `heap_size`. Used for
    /// write-ahead-log replay error recovery; rolling back a cell that is
    /// not present is a silent no-op.
    pub fn rollback(&self, cell: &Cell) {
        let inner = self.inner.read();
        if let Some(found) = inner.snapshot.get(cell) {
            if found.mvcc() == cell.mvcc() {
                inner.snapshot.remove(cell);
            }
        }
        if let Some(found) = inner.live.get(cell) {
            if found.mvcc() == cell.mvcc() && inner.live.remove(cell) {
                self.stamp_oldest_edit();
                self.apply_size_delta(-Self::heap_size_change(&found, true));
            }
        }
    }

    // -------------------------------------------------------------------------
    // Snapshot Protocol
    // -------------------------------------------------------------------------

    /// Freezes the live set for flushing.
    ///
    /// If a previous snapshot has not been cleared yet, nothing is mutated:
    /// the condition is logged and the returned descriptor reflects the
    /// still-outstanding frozen set. Otherwise the live set, its allocator
    /// and its time-range tracker move to the snapshot slot, fresh ones are
    /// installed, and `heap_size` resets to [`DEEP_OVERHEAD`].
    ///
    /// Must be called under the enclosing store's write lock.
    pub fn snapshot(&self) -> MemStoreSnapshot {
        let mut inner = self.inner.write();
        if !inner.snapshot.is_empty() {
            let err = StrataError::InvalidState(
                "snapshot requested without clearing the previous one".to_string(),
            );
            tracing::warn!("{err}; returning the outstanding frozen set");
        } else {
            self.snapshot_id
                .store(self.clock.now_millis() as i64, Ordering::Relaxed);
            self.snapshot_size.store(self.key_size(), Ordering::Relaxed);
            if !inner.live.is_empty() {
                inner.snapshot = mem::replace(&mut inner.live, Arc::new(CellSet::new()));
                inner.snapshot_time_range = mem::replace(
                    &mut inner.live_time_range,
                    Arc::new(TimeRangeTracker::new()),
                );
                inner.snapshot_allocator = inner.live_allocator.take();
                if self.config.use_slab_allocator {
                    inner.live_allocator = Some(Arc::new(SlabAllocator::new(&self.config)));
                }
                self.heap_size.store(DEEP_OVERHEAD, Ordering::Relaxed);
                self.time_of_oldest_edit.store(u64::MAX, Ordering::Relaxed);
            }
        }
        MemStoreSnapshot {
            id: self.snapshot_id.load(Ordering::Relaxed),
            cell_count: inner.snapshot.len(),
            byte_size: self.snapshot_size.load(Ordering::Relaxed),
            time_range: Arc::clone(&inner.snapshot_time_range),
            scanner: SnapshotScanner::new(Arc::clone(&inner.snapshot)),
        }
    }

    /// Lets go of a persisted snapshot. Fails with
    /// [`StrataError::SnapshotIdMismatch`] if `id` is not the outstanding
    /// snapshot's id. The snapshot allocator is detached; its chunks are
    /// released once the last scanner referencing them closes.
    ///
    /// Must be called under the enclosing store's write lock.
    pub fn clear_snapshot(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write();
        let current = self.snapshot_id.load(Ordering::Relaxed);
        if current != id {
            return Err(StrataError::SnapshotIdMismatch {
                current,
                passed: id,
            });
        }
        if !inner.snapshot.is_empty() {
            inner.snapshot = Arc::new(CellSet::new());
            inner.snapshot_time_range = Arc::new(TimeRangeTracker::new());
        }
        self.snapshot_size.store(0, Ordering::Relaxed);
        self.snapshot_id.store(-1, Ordering::Relaxed);
        if let Some(allocator) = inner.snapshot_allocator.take() {
            allocator.close();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Read Path
    // -------------------------------------------------------------------------

    /// Opens a scanner over the merged live and snapshot sets at the given
    /// MVCC read point. The scanner captures the current set and allocator
    /// references; a later snapshot swap does not affect it, so the
    /// enclosing store re-opens scanners at flush boundaries.
    pub fn scanner(&self, read_point: u64) -> MemStoreScanner {
        let inner = self.inner.read();
        MemStoreScanner::new(
            Arc::clone(&inner.live),
            Arc::clone(&inner.snapshot),
            inner.live_allocator.clone(),
            inner.snapshot_allocator.clone(),
            Arc::clone(&inner.live_time_range),
            Arc::clone(&inner.snapshot_time_range),
            read_point,
        )
    }

    /// Smallest cell across live and snapshot whose row sorts strictly after
    /// `cell`'s row, or the first cell overall if `cell` is `None`. Deleted
    /// and expired cells are not suppressed here; higher layers handle them.
    pub fn next_row(&self, cell: Option<&Cell>) -> Option<Cell> {
        let inner = self.inner.read();
        let live = Self::next_row_in(&inner.live, cell);
        let snap = Self::next_row_in(&inner.snapshot, cell);
        match (live, snap) {
            (Some(a), Some(b)) => {
                if compare_rows(&a, &b) != CmpOrdering::Greater {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (a, b) => a.or(b),
        }
    }

    /// Finds the closest row at or before the tracker's target, first in the
    /// live set and then in the snapshot. Walks forward within the target
    /// row, then backwards a row at a time while the tracker still reports a
    /// better candidate is possible. Expired cells met on the way are
    /// removed from the set.
    pub fn row_key_at_or_before(&self, tracker: &mut dyn ClosestRowTracker) {
        let inner = self.inner.read();
        Self::row_key_at_or_before_in(&inner.live, tracker);
        Self::row_key_at_or_before_in(&inner.snapshot, tracker);
    }

    /// True if a scan over `range` could match this memstore: the range
    /// overlaps the live or snapshot time range, and the newest buffered
    /// timestamp has not already expired.
    pub fn should_use(&self, range: &TimeRange, oldest_unexpired_ts: u64) -> bool {
        let inner = self.inner.read();
        (inner.live_time_range.includes_range(range)
            || inner.snapshot_time_range.includes_range(range))
            && inner
                .live_time_range
                .max_timestamp()
                .max(inner.snapshot_time_range.max_timestamp())
                >= oldest_unexpired_ts
    }

    // -------------------------------------------------------------------------
    // Size Accounting
    // -------------------------------------------------------------------------

    /// Estimated heap usage of the live set, not including the snapshot
    pub fn heap_size(&self) -> u64 {
        self.heap_size.load(Ordering::Relaxed)
    }

    /// Alias for [`MemStore::heap_size`], the size external memory-pressure
    /// policies sum across column families
    pub fn size(&self) -> u64 {
        self.heap_size()
    }

    /// Bytes the next flush would persist: the frozen snapshot's size while
    /// one is outstanding (even a zero-byte snapshot of an empty live set),
    /// else the live set's size
    pub fn flushable_size(&self) -> u64 {
        if self.snapshot_id.load(Ordering::Relaxed) != -1 {
            self.snapshot_size.load(Ordering::Relaxed)
        } else {
            self.key_size()
        }
    }

    /// Id of the outstanding snapshot; -1 when none
    pub fn snapshot_id(&self) -> i64 {
        self.snapshot_id.load(Ordering::Relaxed)
    }

    /// Wall-clock time of the oldest edit still in the live set;
    /// `u64::MAX` when the live set has no edits
    pub fn time_of_oldest_edit(&self) -> u64 {
        self.time_of_oldest_edit.load(Ordering::Relaxed)
    }

    /// Cells currently in the live set
    pub fn live_cell_count(&self) -> usize {
        self.inner.read().live.len()
    }

    /// Cells currently frozen in the snapshot
    pub fn snapshot_cell_count(&self) -> usize {
        self.inner.read().snapshot.len()
    }

    /// Logs every cell in the live set and the snapshot at debug level
    pub fn dump(&self) {
        let inner = self.inner.read();
        for cell in inner.live.iter() {
            tracing::debug!(?cell, "live");
        }
        for cell in inner.snapshot.iter() {
            tracing::debug!(?cell, "snapshot");
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Insert without the allocator clone. Callers already hold the read
    /// guard.
    fn internal_add(&self, inner: &MemStoreInner, cell: Cell) -> i64 {
        let timestamp = cell.timestamp();
        let size = Self::heap_size_change(&cell, true);
        let newly_added = inner.live.add(cell);
        self.stamp_oldest_edit();
        inner.live_time_range.include_timestamp(timestamp);
        let delta = if newly_added { size } else { 0 };
        self.apply_size_delta(delta);
        delta
    }

    /// Copies the cell's payload into the live slab, keeping the cell's own
    /// buffer when the allocator is disabled or refuses the length
    fn maybe_clone_with_allocator(inner: &MemStoreInner, cell: Cell) -> Cell {
        let Some(allocator) = inner.live_allocator.as_deref() else {
            return cell;
        };
        let Some(mut slice) = allocator.allocate(cell.payload_len()) else {
            return cell;
        };

        let (row_len, family_len, qualifier_len) =
            (cell.row().len(), cell.family().len(), cell.qualifier().len());
        let mut at = 0;
        for part in [cell.row(), cell.family(), cell.qualifier(), cell.value()] {
            slice[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        let buf = slice.freeze();

        let family_end = row_len + family_len;
        let qualifier_end = family_end + qualifier_len;
        Cell::from_parts(
            buf.slice(..row_len),
            buf.slice(row_len..family_end),
            buf.slice(family_end..qualifier_end),
            cell.timestamp(),
            cell.cell_type(),
            cell.mvcc(),
            buf.slice(qualifier_end..),
        )
    }

    fn upsert_one(&self, inner: &MemStoreInner, cell: Cell, read_point: u64) -> i64 {
        let mut delta = self.internal_add(inner, cell.clone());

        let sentinel = Cell::first_on_column(
            cell.row().clone(),
            cell.family().clone(),
            cell.qualifier().clone(),
        );
        let mut kept_existing = false;
        let mut cursor = inner.live.first_at_or_above(&sentinel);
        while let Some(current) = cursor {
            if !(current.matching_row(&cell) && current.matching_column(&cell)) {
                break;
            }
            let is_inserted = current == cell;
            if !is_inserted
                && current.cell_type() == CellType::Put
                && current.mvcc() <= read_point
            {
                if kept_existing {
                    if inner.live.remove(&current) {
                        let removed = Self::heap_size_change(&current, true);
                        delta -= removed;
                        self.apply_size_delta(-removed);
                        self.stamp_oldest_edit();
                    }
                } else {
                    kept_existing = true;
                }
            }
            cursor = inner.live.first_above(&current);
        }
        delta
    }

    fn next_row_in(set: &CellSet, key: Option<&Cell>) -> Option<Cell> {
        let mut cursor = match key {
            None => set.first(),
            Some(k) => set.first_at_or_above(k),
        };
        while let Some(cell) = cursor {
            match key {
                Some(k) if compare_rows(&cell, k) != CmpOrdering::Greater => {
                    cursor = set.first_above(&cell);
                }
                _ => return Some(cell),
            }
        }
        None
    }

    fn row_key_at_or_before_in(set: &CellSet, tracker: &mut dyn ClosestRowTracker) {
        if set.is_empty() {
            return;
        }
        let target = tracker.target_key();
        if !Self::walk_forward_in_single_row(set, &target, tracker) {
            // Found nothing in the target row; back up a row at a time.
            Self::row_key_before(set, tracker);
        }
    }

    /// Walks forward from `first_on_row`, accumulating deletes into the
    /// tracker until it accepts a candidate on the row. Returns true if a
    /// candidate was found.
    fn walk_forward_in_single_row(
        set: &CellSet,
        first_on_row: &Cell,
        tracker: &mut dyn ClosestRowTracker,
    ) -> bool {
        let mut cursor = set.first_at_or_above(first_on_row);
        while let Some(cell) = cursor {
            if tracker.is_too_far(&cell, first_on_row) {
                break;
            }
            if tracker.is_expired(&cell) {
                set.remove(&cell);
                cursor = set.first_above(&cell);
                continue;
            }
            if tracker.handle(&cell) {
                return true;
            }
            cursor = set.first_above(&cell);
        }
        false
    }

    /// Walks backwards through `set` a row at a time until a candidate turns
    /// up or the tracker rules further rows out
    fn row_key_before(set: &CellSet, tracker: &mut dyn ClosestRowTracker) {
        let mut first_on_row = tracker.target_key();
        while let Some(member) = Self::member_of_previous_row(set, tracker, &first_on_row) {
            if !tracker.is_target_table(&member) {
                break;
            }
            if !tracker.is_better_candidate(&member) {
                break;
            }
            first_on_row = Cell::first_on_row(member.row().clone());
            if Self::walk_forward_in_single_row(set, &first_on_row, tracker) {
                break;
            }
        }
    }

    /// Last non-expired cell strictly before `first_on_row`, removing
    /// expired cells met on the way down
    fn member_of_previous_row(
        set: &CellSet,
        tracker: &mut dyn ClosestRowTracker,
        first_on_row: &Cell,
    ) -> Option<Cell> {
        let mut cursor = set.last_below(first_on_row);
        while let Some(cell) = cursor {
            if tracker.is_expired(&cell) {
                set.remove(&cell);
                cursor = set.last_below(&cell);
                continue;
            }
            return Some(cell);
        }
        None
    }

    /// Size delta for inserting or removing a cell, including the backing
    /// set's node overhead. Zero when the cell was already present.
    fn heap_size_change(cell: &Cell, newly_present: bool) -> i64 {
        if newly_present {
            (CELL_SET_ENTRY_OVERHEAD + cell.heap_size()) as i64
        } else {
            0
        }
    }

    /// Live size excluding the empty-instance overhead
    fn key_size(&self) -> u64 {
        self.heap_size().saturating_sub(DEEP_OVERHEAD)
    }

    fn apply_size_delta(&self, delta: i64) {
        if delta >= 0 {
            self.heap_size.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.heap_size.fetch_sub(delta.unsigned_abs(), Ordering::Relaxed);
        }
    }

    /// Stamps the oldest-edit time on the first edit after a reset
    fn stamp_oldest_edit(&self) {
        let _ = self.time_of_oldest_edit.compare_exchange(
            u64::MAX,
            self.clock.now_millis(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
