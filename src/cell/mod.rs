//! Cell Module
//!
//! The atomic record of the column-family data model.
//!
//! ## Responsibilities
//! - Immutable cell record: (row, family, qualifier, timestamp, type, mvcc) -> value
//! - Composite byte-lexicographic ordering with descending timestamps
//! - First-on-row / first-on-column seek sentinels
//! - Heap size estimation for MemStore accounting
//!
//! ## Data Structure Choice
//! Cell fields are `bytes::Bytes` handles: a cell either owns its backing
//! buffer or holds slices into a shared slab chunk, and cloning a cell never
//! copies payload bytes.

mod comparator;
mod record;

pub use comparator::{compare, compare_rows};
pub use record::{Cell, LATEST_TIMESTAMP};

/// Type tag carried by every cell.
///
/// The numeric codes participate in ordering: at equal timestamp, higher
/// codes sort first, so delete markers lead the puts they mask. `Maximum`
/// sorts ahead of every concrete type and is used by seek sentinels;
/// `Minimum` sorts after every concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellType {
    Minimum = 0,
    Put = 4,
    Delete = 8,
    DeleteColumn = 12,
    DeleteFamily = 14,
    Maximum = 255,
}

impl CellType {
    /// Numeric code used by the comparator
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True for any of the delete (tombstone) variants
    pub fn is_delete(self) -> bool {
        matches!(
            self,
            CellType::Delete | CellType::DeleteColumn | CellType::DeleteFamily
        )
    }
}
