//! Boundary-tag block layout.
//!
//! ```text
//!   Allocated block:
//!   ┌────────┬──────────────────────────────────────┬────────┐
//!   │ header │              payload                 │ footer │
//!   └────────┴──────────────────────────────────────┴────────┘
//!            ▲
//!            └── block offset (bp), returned to the caller
//!
//!   Free block:
//!   ┌────────┬────────┬────────┬────────────────────┬────────┐
//!   │ header │  prev  │  next  │      (unused)      │ footer │
//!   └────────┴────────┴────────┴────────────────────┴────────┘
//! ```
//!
//! Header and footer hold the same [`Tag`]. Blocks are identified by the
//! offset of their payload inside the region, like the pointer a caller
//! receives.

use crate::align::{ALIGNMENT, checked_align};

/// Width of a tag or a free-list link.
pub const WORD: usize = 8;

/// Bytes of a block that are not payload (header + footer).
pub const OVERHEAD: usize = 2 * WORD;

/// Smallest block that can hold its tags and both free-list links.
pub const MIN_BLOCK_SIZE: usize = OVERHEAD + 2 * WORD;

/// Offset of the predecessor link inside a free block's payload.
pub const PREV_LINK: usize = 0;

/// Offset of the successor link inside a free block's payload.
pub const NEXT_LINK: usize = WORD;

const ALLOCATED_BIT: usize = 0x1;
const SIZE_MASK: usize = !(ALIGNMENT - 1);

/// A packed (size, allocated) boundary tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag(usize);

impl Tag {
  pub fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    debug_assert_eq!(size & !SIZE_MASK, 0, "block size {size} is not aligned");
    Self(size | allocated as usize)
  }

  pub fn from_raw(raw: usize) -> Self {
    Self(raw)
  }

  pub fn raw(self) -> usize {
    self.0
  }

  pub fn size(self) -> usize {
    self.0 & SIZE_MASK
  }

  pub fn is_allocated(self) -> bool {
    self.0 & ALLOCATED_BIT != 0
  }
}

/// Offset of the header of the block at `bp`.
pub fn header(bp: usize) -> usize {
  bp - WORD
}

/// Offset of the footer of the block at `bp` with the given size.
pub fn footer(
  bp: usize,
  size: usize,
) -> usize {
  bp + size - OVERHEAD
}

/// Offset of the footer of the block preceding `bp`.
pub fn prev_footer(bp: usize) -> usize {
  bp - OVERHEAD
}

/// Decoded view of a block. Which variant applies is decided only by the
/// committed allocation bit; the links of a free block live in the same
/// bytes an allocated block hands out as payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
  Allocated { size: usize },
  Free { size: usize, prev: usize, next: usize },
}

impl Block {
  pub fn size(&self) -> usize {
    match *self {
      Block::Allocated { size } | Block::Free { size, .. } => size,
    }
  }

  pub fn is_allocated(&self) -> bool {
    matches!(self, Block::Allocated { .. })
  }
}

/// Block size needed to satisfy a request of `size` payload bytes.
///
/// Returns `None` if the adjustment overflows.
pub fn adjusted_size(size: usize) -> Option<usize> {
  let size = checked_align(size)?.checked_add(OVERHEAD)?;
  Some(size.max(MIN_BLOCK_SIZE))
}
