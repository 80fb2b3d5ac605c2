//! Cell record
//!
//! Immutable cell carrying its coordinates and value as cheap byte handles.

use std::cmp::{min, Ordering};
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::mem::size_of;

use bytes::Bytes;

use super::{compare, CellType};

/// Timestamp assigned to edits that did not specify one; sorts before every
/// concrete timestamp because timestamps order descending.
pub const LATEST_TIMESTAMP: u64 = u64::MAX;

/// Maximum length of row and value bytes to display in debug output.
const MAX_DEBUG_LEN: usize = 64;

/// An immutable record at (row, family, qualifier, timestamp, type, mvcc).
///
/// Equality and ordering cover the coordinates only; the value rides along
/// but never participates in comparisons. Cells differing only in mvcc are
/// distinct elements.
#[derive(Clone)]
pub struct Cell {
    row: Bytes,
    family: Bytes,
    qualifier: Bytes,
    timestamp: u64,
    cell_type: CellType,
    mvcc: u64,
    value: Bytes,
}

impl Cell {
    /// Creates a cell with mvcc 0 (immediately visible to every reader)
    pub fn new(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
        timestamp: u64,
        cell_type: CellType,
        value: impl Into<Bytes>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            timestamp,
            cell_type,
            mvcc: 0,
            value: value.into(),
        }
    }

    /// Sets the mvcc version, consuming and returning the cell
    pub fn with_mvcc(mut self, mvcc: u64) -> Self {
        self.mvcc = mvcc;
        self
    }

    /// Rebuilds a cell from already-sliced parts. Used when payload bytes
    /// have been copied into a slab chunk.
    pub fn from_parts(
        row: Bytes,
        family: Bytes,
        qualifier: Bytes,
        timestamp: u64,
        cell_type: CellType,
        mvcc: u64,
        value: Bytes,
    ) -> Self {
        Self {
            row,
            family,
            qualifier,
            timestamp,
            cell_type,
            mvcc,
            value,
        }
    }

    /// Sentinel sorting strictly before every real cell on `row`
    pub fn first_on_row(row: impl Into<Bytes>) -> Self {
        Self::new(
            row,
            Bytes::new(),
            Bytes::new(),
            LATEST_TIMESTAMP,
            CellType::Maximum,
            Bytes::new(),
        )
    }

    /// Sentinel sorting strictly before every real cell on
    /// (row, family, qualifier)
    pub fn first_on_column(
        row: impl Into<Bytes>,
        family: impl Into<Bytes>,
        qualifier: impl Into<Bytes>,
    ) -> Self {
        Self::new(
            row,
            family,
            qualifier,
            LATEST_TIMESTAMP,
            CellType::Maximum,
            Bytes::new(),
        )
    }

    pub fn row(&self) -> &Bytes {
        &self.row
    }

    pub fn family(&self) -> &Bytes {
        &self.family
    }

    pub fn qualifier(&self) -> &Bytes {
        &self.qualifier
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn mvcc(&self) -> u64 {
        self.mvcc
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// True for any of the delete (tombstone) variants
    pub fn is_delete(&self) -> bool {
        self.cell_type.is_delete()
    }

    /// True if both cells share the same row bytes
    pub fn matching_row(&self, other: &Cell) -> bool {
        self.row == other.row
    }

    /// True if both cells share the same family and qualifier bytes
    pub fn matching_column(&self, other: &Cell) -> bool {
        self.family == other.family && self.qualifier == other.qualifier
    }

    /// Estimated heap footprint of this cell: the record itself plus every
    /// payload byte it references
    pub fn heap_size(&self) -> u64 {
        (size_of::<Cell>()
            + self.row.len()
            + self.family.len()
            + self.qualifier.len()
            + self.value.len()) as u64
    }

    /// Total payload length: row + family + qualifier + value bytes
    pub fn payload_len(&self) -> usize {
        self.row.len() + self.family.len() + self.qualifier.len() + self.value.len()
    }
}

impl Debug for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Truncate row output to keep logs readable with binary keys
        let row_len = min(self.row.len(), MAX_DEBUG_LEN);
        f.debug_struct("Cell")
            .field("row", &String::from_utf8_lossy(&self.row[..row_len]))
            .field("family", &String::from_utf8_lossy(&self.family))
            .field("qualifier", &String::from_utf8_lossy(&self.qualifier))
            .field("timestamp", &self.timestamp)
            .field("type", &self.cell_type)
            .field("mvcc", &self.mvcc)
            .field("value_len", &self.value.len())
            .finish()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        // Consistent with Ord: coordinates only, value excluded
        compare(self, other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}
