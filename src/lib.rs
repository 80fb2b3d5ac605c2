//! # StrataKV
//!
//! The in-memory write buffer (MemStore) of a log-structured column-family
//! storage engine, with:
//! - An ordered, concurrent cell set keyed by (row, family, qualifier,
//!   timestamp, type, mvcc)
//! - A slab allocator that defragments cell payloads and participates in
//!   scanner lifetime
//! - An O(1) snapshot/flush handoff under multi-version concurrency control
//! - Forward and reverse scanners that ride through concurrent mutation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Column-Family Store                          │
//! │          (read/write locks, MVCC read points)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      MemStore                                │
//! │        add / delete / upsert / rollback / snapshot           │
//! └─────┬──────────────────┬────────────────────────┬───────────┘
//!       │                  │                        │
//!       ▼                  ▼                        ▼
//! ┌───────────┐     ┌─────────────┐          ┌─────────────┐
//! │ Live Set  │     │  Snapshot   │          │    Slab     │
//! │ (writes)  │     │ (flushing)  │          │  Allocator  │
//! └─────┬─────┘     └──────┬──────┘          └─────────────┘
//!       │                  │
//!       └────────┬─────────┘
//!                ▼
//!        ┌───────────────┐
//!        │MemStoreScanner│
//!        │ (merged view) │
//!        └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod cell;
pub mod clock;
pub mod memstore;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StrataError};
pub use config::Config;
pub use cell::{Cell, CellType, LATEST_TIMESTAMP};
pub use clock::{Clock, SystemClock};
pub use memstore::{
    CellScanner, CellSet, ClosestRowTracker, MemStore, MemStoreScanner, MemStoreSnapshot,
    SlabAllocator, SnapshotScanner, TimeRange, TimeRangeTracker, CELL_SET_ENTRY_OVERHEAD,
    DEEP_OVERHEAD, FIXED_OVERHEAD,
};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
