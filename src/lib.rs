//! # exalloc - An Explicit Free-List Allocator
//!
//! This crate provides a dynamic memory allocator that manages a single
//! contiguous region, grown on demand through a pluggable memory source
//! (`sbrk(2)` or a fixed-capacity arena).
//!
//! ## Overview
//!
//! Every block carries its size and allocation state twice, in a header
//! before the payload and a footer after it. Free blocks are chained into an
//! explicit doubly-linked list whose links live inside the free payloads:
//!
//! ```text
//!   Heap Region:
//!
//!   ┌──────────┬───────────┬──────────┬───────────┬──────────┬──────────┐
//!   │ prologue │ allocated │   free   │ allocated │   free   │ epilogue │
//!   └──────────┴───────────┴──────────┴───────────┴──────────┴──────────┘
//!                               ▲                      │
//!                               └──────── next ────────┘
//!                                           ▲
//!                                          head (most recently freed)
//! ```
//!
//! - **Allocate**: first-fit search of the free list; the chosen block is
//!   split when the remainder can stand alone, otherwise consumed whole. On a
//!   miss the region grows and the new space is merged with a trailing free
//!   block.
//! - **Free**: the block is marked free and merged with free neighbours in
//!   O(1) using the boundary tags, so no two free blocks are ever adjacent.
//! - **Resize**: shrinks in place, grows by moving.
//!
//! ## Crate Structure
//!
//! ```text
//!   exalloc
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Boundary-tag layout and block view
//!   ├── region     - Bounds-checked access to the managed bytes (internal)
//!   ├── source     - MemorySource trait, SbrkSource, ArenaSource
//!   ├── free_list  - Explicit LIFO free list
//!   ├── fit        - FitPolicy trait, FirstFit, BestFit
//!   ├── heap       - Heap: growth, coalescing, placement, public operations
//!   └── check      - Consistency checker
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use exalloc::{ArenaSource, Heap};
//!
//! let mut heap = Heap::new(ArenaSource::default()).unwrap();
//!
//! let ptr = heap.allocate(64);
//! assert!(!ptr.is_null());
//!
//! unsafe {
//!     ptr.write_bytes(0x2A, 64);
//!     let ptr = heap.resize(ptr, 128);
//!     assert_eq!(*ptr.add(63), 0x2A);
//!     heap.free(ptr);
//! }
//!
//! assert!(heap.check(false).is_empty());
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No shrinking**: Memory is never returned to the memory source
//! - **`SbrkSource` owns the program break**: Nothing else may move it
//!
//! ## Safety
//!
//! Allocation is safe; freeing and resizing take raw pointers and are
//! `unsafe`. A pointer that does not belong to the heap makes them panic.

pub mod align;
pub mod block;
mod check;
mod config;
mod error;
mod fit;
mod free_list;
mod heap;
mod region;
mod source;

pub use check::Violation;
pub use config::HeapConfig;
pub use error::{HeapError, HeapResult, SourceError};
pub use fit::{BestFit, FirstFit, FitPolicy};
pub use free_list::{FreeBlock, FreeBlocks};
pub use heap::{BlockInfo, Heap};
pub use source::{ArenaSource, MemorySource, SbrkSource};
