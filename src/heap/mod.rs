//! The heap instance: region, free list and the policies driving them.
//!
//! ```text
//!   offset 0                                                      len
//!   ┌──────────┬─────────┬─────────┬─────────┬─────┬───────────────┐
//!   │ prologue │ block 1 │ block 2 │ block 3 │ ... │ epilogue hdr  │
//!   │ 32 B, a  │         │         │         │     │ size 0, a     │
//!   └──────────┴─────────┴─────────┴─────────┴─────┴───────────────┘
//! ```

mod coalesce;
mod ops;
mod place;

use log::debug;

use crate::{
  align::{self, ALIGNMENT},
  block::{self, MIN_BLOCK_SIZE, OVERHEAD, Tag, WORD},
  config::HeapConfig,
  error::{HeapError, HeapResult, SourceError},
  fit::{FirstFit, FitPolicy},
  free_list::FreeList,
  region::Region,
  source::MemorySource,
};

/// Payload offset of the prologue block.
pub(crate) const PROLOGUE: usize = WORD;

/// Bytes written at initialisation: prologue block plus epilogue header.
const INITIAL_SPAN: usize = MIN_BLOCK_SIZE + WORD;

/// An explicit free-list allocator over a region grown by `S`.
///
/// Not thread-safe: every operation mutates the heap in place.
pub struct Heap<S: MemorySource, P: FitPolicy = FirstFit> {
  pub(crate) region: Region,
  pub(crate) free_list: FreeList,
  source: S,
  policy: P,
  config: HeapConfig,
}

/// A block as seen by an address-ordered walk of the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Payload address.
  pub ptr: *mut u8,
  /// Total block size, tags included.
  pub size: usize,
  pub allocated: bool,
}

impl<S: MemorySource> Heap<S, FirstFit> {
  /// Creates a first-fit heap with the default configuration.
  pub fn new(source: S) -> HeapResult<Self> {
    Self::with_config(source, HeapConfig::default())
  }

  pub fn with_config(
    source: S,
    config: HeapConfig,
  ) -> HeapResult<Self> {
    Self::with_policy(source, FirstFit, config)
  }
}

impl<S: MemorySource, P: FitPolicy> Heap<S, P> {
  /// Creates a heap: writes the prologue and epilogue sentinels, then grows
  /// the region by one chunk.
  pub fn with_policy(
    mut source: S,
    policy: P,
    config: HeapConfig,
  ) -> HeapResult<Self> {
    let start = source.extend(0)?;
    let aligned = align::checked_align(start.as_ptr() as usize);
    let Some(base) = aligned.and_then(|aligned| {
      std::ptr::NonNull::new(start.as_ptr().wrapping_add(aligned - start.as_ptr() as usize))
    }) else {
      return Err(SourceError::Failed { requested: INITIAL_SPAN }.into());
    };

    let padding = base.as_ptr() as usize - start.as_ptr() as usize;
    if padding > 0 {
      source.extend(padding)?;
    }

    let mut region = Region::new(base);
    region.grow(&mut source, INITIAL_SPAN)?;
    region.set_tags(PROLOGUE, MIN_BLOCK_SIZE, true);
    region.write(block::header(PROLOGUE + MIN_BLOCK_SIZE), Tag::new(0, true).raw());

    let mut heap = Self {
      region,
      free_list: FreeList::new(PROLOGUE),
      source,
      policy,
      config,
    };

    heap.extend_heap(config.chunk_size)?;
    debug!(
      "heap initialised at {:p}, {} bytes",
      heap.region.ptr_at(0),
      heap.region.len()
    );

    Ok(heap)
  }

  /// Grows the region by at least `size` bytes and returns the resulting
  /// free block, already merged with a free block that preceded the old end.
  fn extend_heap(
    &mut self,
    size: usize,
  ) -> HeapResult<usize> {
    let size = align::checked_align(size)
      .ok_or(HeapError::SizeOverflow { requested: size })?
      .max(MIN_BLOCK_SIZE);

    // The old epilogue header becomes the new block's header.
    let bp = self.region.grow(&mut self.source, size)?;
    self.region.set_tags(bp, size, false);
    self.region.write(block::header(bp + size), Tag::new(0, true).raw());

    debug!("heap grown by {size} bytes to {}", self.region.len());

    Ok(self.coalesce(bp))
  }

  /// Current size of the managed region, sentinels included.
  pub fn heap_size(&self) -> usize {
    self.region.len()
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Walks every block between the sentinels in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    let mut bp = self.region.next_block(PROLOGUE);

    std::iter::from_fn(move || {
      let tag = self.region.tag(bp);
      if tag.size() == 0 {
        return None;
      }

      let info = self.block_info(bp);
      bp += tag.size();
      Some(info)
    })
  }

  /// Walks the free list from its head.
  pub fn free_blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self
      .free_list
      .iter(&self.region)
      .map(|block| self.block_info(block.offset))
  }

  /// Payload bytes usable through `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this heap and not freed since.
  pub unsafe fn usable_size(
    &self,
    ptr: *mut u8,
  ) -> usize {
    self.region.size(self.block_offset(ptr)) - OVERHEAD
  }

  fn block_info(
    &self,
    bp: usize,
  ) -> BlockInfo {
    let tag = self.region.tag(bp);

    BlockInfo {
      ptr: self.region.ptr_at(bp),
      size: tag.size(),
      allocated: tag.is_allocated(),
    }
  }

  fn block_offset(
    &self,
    ptr: *mut u8,
  ) -> usize {
    match self.region.offset_of(ptr) {
      Some(bp) if bp > PROLOGUE && bp % ALIGNMENT == 0 => bp,
      _ => panic!("pointer {ptr:p} does not belong to this heap"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::ptr::NonNull;

  use crate::source::ArenaSource;

  #[test]
  fn test_init_layout() {
    let heap = Heap::new(ArenaSource::default()).unwrap();

    assert_eq!(heap.heap_size(), INITIAL_SPAN + MIN_BLOCK_SIZE);
    assert_eq!(heap.region.tag(PROLOGUE), Tag::new(MIN_BLOCK_SIZE, true));

    let blocks: Vec<_> = heap.blocks().collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].size, MIN_BLOCK_SIZE);
    assert!(!blocks[0].allocated);
    assert_eq!(heap.free_blocks().count(), 1);
  }

  #[test]
  fn test_init_with_chunk_size() {
    let heap = Heap::with_config(
      ArenaSource::default(),
      HeapConfig::default().with_chunk_size(4093),
    )
    .unwrap();

    assert_eq!(heap.blocks().next().unwrap().size, 4096);
  }

  #[test]
  fn test_init_fails_without_memory() {
    let result = Heap::new(ArenaSource::with_capacity(INITIAL_SPAN));

    assert!(matches!(
      result,
      Err(HeapError::Source(SourceError::Exhausted { .. }))
    ));
  }

  /// Hands out a program break that cannot be aligned without wrapping.
  struct TopOfAddressSpace;

  impl MemorySource for TopOfAddressSpace {
    fn extend(
      &mut self,
      _increment: usize,
    ) -> Result<NonNull<u8>, SourceError> {
      Ok(NonNull::new((usize::MAX - 3) as *mut u8).unwrap())
    }
  }

  #[test]
  fn test_init_fails_when_break_cannot_be_aligned() {
    let result = Heap::new(TopOfAddressSpace);

    assert!(matches!(
      result,
      Err(HeapError::Source(SourceError::Failed { .. }))
    ));
  }

  #[test]
  fn test_extend_merges_with_trailing_free_block() {
    let mut heap = Heap::new(ArenaSource::default()).unwrap();

    let bp = heap.extend_heap(64).unwrap();

    assert_eq!(bp, PROLOGUE + MIN_BLOCK_SIZE);
    assert_eq!(heap.region.size(bp), MIN_BLOCK_SIZE + 64);
    assert_eq!(heap.free_blocks().count(), 1);
    assert_eq!(heap.region.tag(heap.region.next_block(bp)), Tag::new(0, true));
  }
}
