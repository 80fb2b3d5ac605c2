//! Slab allocator
//!
//! Copies small-to-medium cell payloads into large shared chunks so the
//! memstore's churn does not fragment the heap, and keeps scanner-visible
//! bytes alive after the owning set has been flushed.
//!
//! ## Lifetime
//! Every slice handed out is a refcounted view into its chunk; a chunk is
//! reclaimed when the allocator has been detached (`close`) and no slice or
//! scanner still references it. Scanners opened against this allocator
//! register via `inc_scanner_count` and deregister on close.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::config::Config;

/// Chunked arena for cell payload bytes.
///
/// `allocate` is called under the enclosing store's read lock; the scanner
/// count is adjusted from any thread. Issued bytes never move.
pub struct SlabAllocator {
    /// Active chunk; replaced when it cannot fit a request
    chunk: Mutex<BytesMut>,

    /// Capacity of each fresh chunk
    chunk_size: usize,

    /// Requests larger than this are refused (caller keeps its own buffer)
    max_alloc: usize,

    /// Chunks created over the allocator's lifetime
    chunks_created: AtomicUsize,

    /// Live scanners holding cells carved from this allocator
    scanner_count: AtomicUsize,

    /// Set once the memstore has let go of this allocator
    closed: AtomicBool,
}

impl SlabAllocator {
    /// Creates an allocator sized from `config`. The first chunk is
    /// allocated lazily on first use.
    pub fn new(config: &Config) -> Self {
        Self {
            chunk: Mutex::new(BytesMut::new()),
            chunk_size: config.slab_chunk_size,
            max_alloc: config.slab_max_alloc,
            chunks_created: AtomicUsize::new(0),
            scanner_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Carves a writable slice of exactly `len` bytes out of the active
    /// chunk, or `None` if `len` exceeds the maximum slab allocation.
    ///
    /// The returned buffer shares the chunk's allocation; freeze it into
    /// `Bytes` once filled.
    pub fn allocate(&self, len: usize) -> Option<BytesMut> {
        debug_assert!(
            !self.closed.load(Ordering::Acquire),
            "allocate called on a detached slab allocator"
        );
        if len > self.max_alloc {
            return None;
        }
        let mut chunk = self.chunk.lock();
        if chunk.capacity() < len {
            // Retire the active chunk; slices already issued keep it alive.
            *chunk = BytesMut::with_capacity(self.chunk_size.max(len));
            self.chunks_created.fetch_add(1, Ordering::Relaxed);
        }
        chunk.resize(len, 0);
        Some(chunk.split_to(len))
    }

    /// Registers a scanner that references cells carved from this allocator
    pub fn inc_scanner_count(&self) {
        self.scanner_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Deregisters a scanner; reclaims the active chunk when this was the
    /// last scanner and the allocator is already detached
    pub fn dec_scanner_count(&self) {
        let previous = self.scanner_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "scanner count underflow");
        if previous == 1 && self.closed.load(Ordering::Acquire) {
            self.reclaim();
        }
    }

    /// Detaches the allocator after its set has been flushed. Chunks are
    /// reclaimed immediately if no scanner still holds a reference.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if self.scanner_count.load(Ordering::Acquire) == 0 {
            self.reclaim();
        }
    }

    /// Drops the allocator's handle on the active chunk. Chunk memory is
    /// released once the last cell slice into it is dropped.
    fn reclaim(&self) {
        *self.chunk.lock() = BytesMut::new();
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// True when the allocator is detached and unreferenced by scanners
    pub fn is_reclaimable(&self) -> bool {
        self.is_closed() && self.scanner_count.load(Ordering::Acquire) == 0
    }

    /// Number of scanners currently registered
    pub fn scanner_count(&self) -> usize {
        self.scanner_count.load(Ordering::Acquire)
    }

    /// Chunks created over the allocator's lifetime
    pub fn chunks_created(&self) -> usize {
        self.chunks_created.load(Ordering::Relaxed)
    }
}
