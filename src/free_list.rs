//! Explicit free list.
//!
//! ```text
//!   head
//!    │
//!    ▼
//!   ┌──────┐ next ┌──────┐ next ┌──────┐ next ┌──────────┐
//!   │ free │─────▶│ free │─────▶│ free │─────▶│ prologue │ (allocated)
//!   │      │◀─────│      │◀─────│      │      └──────────┘
//!   └──────┘ prev └──────┘ prev └──────┘
//! ```
//!
//! Links are region offsets stored in the free blocks themselves. The
//! prologue is the terminator in both directions: a walk stops at the first
//! allocated block it reaches.

use crate::region::Region;

/// Free-list entry as seen by a fit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  pub offset: usize,
  pub size: usize,
}

#[derive(Debug)]
pub(crate) struct FreeList {
  head: usize,
  sentinel: usize,
}

impl FreeList {
  /// Creates an empty list terminated by the always-allocated `sentinel`.
  pub fn new(sentinel: usize) -> Self {
    Self {
      head: sentinel,
      sentinel,
    }
  }

  pub fn head(&self) -> usize {
    self.head
  }

  /// Pushes the free block `bp` at the head.
  pub fn insert_first(
    &mut self,
    region: &mut Region,
    bp: usize,
  ) {
    region.set_next_link(bp, self.head);
    region.set_prev_link(bp, self.sentinel);

    if !region.is_allocated(self.head) {
      region.set_prev_link(self.head, bp);
    }

    self.head = bp;
  }

  /// Unlinks the block `bp`, which must currently be on the list.
  pub fn remove(
    &mut self,
    region: &mut Region,
    bp: usize,
  ) {
    let prev = region.prev_link(bp);
    let next = region.next_link(bp);

    if region.is_allocated(prev) {
      self.head = next;
    } else {
      region.set_next_link(prev, next);
    }

    if !region.is_allocated(next) {
      region.set_prev_link(next, prev);
    }
  }

  pub fn iter<'a>(
    &self,
    region: &'a Region,
  ) -> FreeBlocks<'a> {
    FreeBlocks {
      region,
      current: self.head,
    }
  }
}

/// Iterator over the free list from the head, in LIFO order.
pub struct FreeBlocks<'a> {
  region: &'a Region,
  current: usize,
}

impl Iterator for FreeBlocks<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    let tag = self.region.tag(self.current);

    if tag.is_allocated() {
      return None;
    }

    let block = FreeBlock {
      offset: self.current,
      size: tag.size(),
    };
    self.current = self.region.next_link(self.current);

    Some(block)
  }
}
