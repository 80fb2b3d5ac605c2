//! Ordered cell set
//!
//! Concurrent navigable set of cells backed by a lock-free skip list.
//! Single-element operations are lock-free and iteration is weakly
//! consistent: a walk concurrent with inserts may or may not observe them.

use std::ops::Bound;

use crossbeam_skiplist::SkipMap;

use crate::cell::Cell;

/// Navigable, comparator-ordered set of cells.
///
/// Inserting a cell that is already present (same coordinates and mvcc) is a
/// no-op that keeps the stored cell; a cell differing only in mvcc is a
/// distinct element.
pub struct CellSet {
    map: SkipMap<Cell, ()>,
}

impl CellSet {
    pub fn new() -> Self {
        Self {
            map: SkipMap::new(),
        }
    }

    /// Inserts `cell`, returning true if it was newly added.
    ///
    /// The membership probe and the insert are two steps; concurrent adds of
    /// byte-identical cells could both report true. Writers stamp a unique
    /// mvcc per edit, which keeps identical concurrent cells out of the
    /// write path.
    pub fn add(&self, cell: Cell) -> bool {
        if self.map.contains_key(&cell) {
            return false;
        }
        self.map.get_or_insert(cell, ());
        true
    }

    /// Removes the element equal to `cell`, returning true if it was present
    pub fn remove(&self, cell: &Cell) -> bool {
        self.map.remove(cell).is_some()
    }

    /// Returns the stored element equal to `cell`
    pub fn get(&self, cell: &Cell) -> Option<Cell> {
        self.map.get(cell).map(|e| e.key().clone())
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        self.map.contains_key(cell)
    }

    /// Smallest element
    pub fn first(&self) -> Option<Cell> {
        self.map.front().map(|e| e.key().clone())
    }

    /// Largest element
    pub fn last(&self) -> Option<Cell> {
        self.map.back().map(|e| e.key().clone())
    }

    /// Smallest element `>= cell` (inclusive tail bound)
    pub fn first_at_or_above(&self, cell: &Cell) -> Option<Cell> {
        self.map
            .lower_bound(Bound::Included(cell))
            .map(|e| e.key().clone())
    }

    /// Smallest element `> cell`
    pub fn first_above(&self, cell: &Cell) -> Option<Cell> {
        self.map
            .lower_bound(Bound::Excluded(cell))
            .map(|e| e.key().clone())
    }

    /// Largest element `< cell` (exclusive head bound)
    pub fn last_below(&self, cell: &Cell) -> Option<Cell> {
        self.map
            .upper_bound(Bound::Excluded(cell))
            .map(|e| e.key().clone())
    }

    /// Ascending walk over the whole set
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.map.iter().map(|e| e.key().clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for CellSet {
    fn default() -> Self {
        Self::new()
    }
}
