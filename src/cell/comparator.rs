//! Cell comparator
//!
//! Composite ordering over whole cells:
//! 1. Row bytes (ascending)
//! 2. Family bytes (ascending)
//! 3. Qualifier bytes (ascending)
//! 4. Timestamp (descending; newer versions first within a column)
//! 5. Type code (descending; tombstones lead puts at equal timestamp)
//! 6. Mvcc version (ascending)
//!
//! The mvcc tie-break keeps every version of a key in a deterministic
//! position so scanners can filter by read point on the way out instead of
//! the set filtering on the way in.

use std::cmp::Ordering;

use super::Cell;

/// Full composite comparison of two cells
pub fn compare(a: &Cell, b: &Cell) -> Ordering {
    compare_rows(a, b)
        .then_with(|| a.family().cmp(b.family()))
        .then_with(|| a.qualifier().cmp(b.qualifier()))
        .then_with(|| b.timestamp().cmp(&a.timestamp()))
        .then_with(|| b.cell_type().code().cmp(&a.cell_type().code()))
        .then_with(|| a.mvcc().cmp(&b.mvcc()))
}

/// Compares only the row bytes of two cells
pub fn compare_rows(a: &Cell, b: &Cell) -> Ordering {
    a.row().cmp(b.row())
}
