//! # segalloc - A Segregated Free List Allocator
//!
//! This crate provides a `malloc`/`free`/`realloc`/`calloc` style allocator
//! over a single contiguous heap region that only grows at its high end.
//!
//! ## Overview
//!
//! Free blocks are tracked in 14 size-class lists and merged with their
//! neighbors as soon as they are freed:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         MANAGED REGION                               │
//!   │                                                                      │
//!   │  ┌───┬──────────┬────────┬────────────┬─────────┬─────────────┬───┐  │
//!   │  │pad│ prologue │ alloc  │    free    │  alloc  │    free     │epi│  │
//!   │  └───┴──────────┴────────┴────────────┴─────────┴─────────────┴───┘  │
//!   │                               ▲                        ▲             │
//!   │                               │                        │             │
//!   │   buckets[i] ─────────────────┘                        │             │
//!   │   buckets[j] ──────────────────────────────────────────┘             │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Allocation: first-fit for small requests, best-fit for large ones.
//!   Release: immediate coalescing through boundary tags.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Header/footer codec and block views
//!   ├── check      - Heap consistency checker
//!   ├── coalesce   - Boundary-tag merging of free neighbors
//!   ├── config     - HeapConfig tunables
//!   ├── error      - HeapError
//!   ├── fit        - First-fit / best-fit search
//!   ├── grow       - Heap extension
//!   ├── heap       - Heap and its public operations
//!   ├── locked     - LockedHeap, a mutex-wrapped GlobalAlloc
//!   ├── place      - Placement and splitting
//!   ├── region     - Region trait, ArenaRegion, SbrkRegion
//!   └── seglist    - Size classes and free-list table
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{ArenaRegion, Heap};
//!
//! let mut heap = Heap::new(ArenaRegion::new(1 << 20));
//!
//! let ptr = heap.allocate(64).unwrap().unwrap();
//! unsafe {
//!   ptr.as_ptr().write_bytes(0x2A, 64);
//!   heap.release(ptr.as_ptr());
//! }
//!
//! assert!(heap.check_heap().is_empty());
//! ```
//!
//! ## Block Format
//!
//! ```text
//!   Allocated Block:
//!   ┌────────────────┬─────────────────────────────────────┐
//!   │  Header (4B)   │              Payload                │
//!   │ size | prev | 1│                                     │
//!   └────────────────┴─────────────────────────────────────┘
//!                    ▲
//!                    └── Pointer returned to user (8-byte aligned)
//!
//!   Free Block:
//!   ┌────────────────┬──────┬──────┬─────────┬────────────────┐
//!   │  Header (4B)   │ prev │ next │  ...    │  Footer (4B)   │
//!   │ size | prev | 0│ link │ link │         │     size       │
//!   └────────────────┴──────┴──────┴─────────┴────────────────┘
//! ```
//!
//! Links are 32-bit offsets from the region base, so one heap spans at most
//! 4 GiB.
//!
//! ## Limitations
//!
//! - **Single-threaded core**: share a heap through [`LockedHeap`]
//! - **Alignment**: payloads are aligned to 8 bytes; larger alignments go
//!   through [`Heap::allocate_aligned`] and cost a split-off front block
//! - **No shrinking**: the region never gives memory back
//!
//! ## Safety
//!
//! Releasing or resizing takes raw pointers, so both are `unsafe`. Pointers
//! that do not belong to the heap are ignored, but interior pointers into a
//! live block cannot be told apart from real ones.

/// Forwards to `log` unless the heap runs with `log_operations` off.
macro_rules! heap_log {
  ($heap:expr, $level:ident, $($arg:tt)+) => {
    if $heap.config.log_operations {
      log::$level!($($arg)+);
    }
  };
}

pub mod align;
pub mod block;
mod check;
mod coalesce;
mod config;
mod error;
mod fit;
mod grow;
mod heap;
mod locked;
mod place;
pub mod region;
pub mod seglist;

pub use block::{BlockRef, BlockView, Header, Links};
pub use check::Violation;
pub use config::{CHUNK_SIZE, FIRST_FIT_LIMIT, HeapConfig};
pub use error::{HeapError, Result};
pub use heap::{Blocks, Heap, HeapStats};
pub use locked::LockedHeap;
pub use region::{ArenaRegion, Region, SbrkRegion};
