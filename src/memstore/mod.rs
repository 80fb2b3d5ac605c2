//! MemStore Module
//!
//! In-memory write buffer for one column family.
//!
//! ## Responsibilities
//! - Absorb all puts and tombstones into an ordered, concurrent cell set
//! - Serve merged reads over the live set and the frozen snapshot
//! - Hand an immutable snapshot to the flusher and let it go on confirmation
//! - Track heap size and the time range of buffered edits
//!
//! ## Data Structure Choice
//! Two `CellSet`s (live and snapshot) instead of a versioned single set:
//! the flush handoff becomes a pointer swap and the live set stays small.
//! The price is two iterators per scanner, paid willingly.

mod allocator;
mod cellset;
mod scanner;
mod store;
mod timerange;

pub use allocator::SlabAllocator;
pub use cellset::CellSet;
pub use scanner::{CellScanner, MemStoreScanner, SnapshotScanner};
pub use store::{
    ClosestRowTracker, MemStore, MemStoreSnapshot, CELL_SET_ENTRY_OVERHEAD, DEEP_OVERHEAD,
    FIXED_OVERHEAD,
};
pub use timerange::{TimeRange, TimeRangeTracker};
