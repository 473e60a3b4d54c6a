use log::trace;

use super::Heap;
use crate::{fit::FitPolicy, source::MemorySource};

impl<S: MemorySource, P: FitPolicy> Heap<S, P> {
  /// Boundary-tag coalescing of the free block at `bp` with its address
  /// neighbours. Inserts the resulting block at the head of the free list
  /// and returns its offset.
  ///
  /// Both neighbours always exist: the prologue and the epilogue are
  /// allocated, so the first and last real blocks never merge past them.
  pub(crate) fn coalesce(
    &mut self,
    bp: usize,
  ) -> usize {
    let prev = self.region.prev_block(bp);
    let next = self.region.next_block(bp);
    let prev_alloc = self.region.prev_footer_tag(bp).is_allocated();
    let next_alloc = self.region.is_allocated(next);
    let mut size = self.region.size(bp);

    let bp = match (prev_alloc, next_alloc) {
      (true, true) => bp,
      (true, false) => {
        size += self.region.size(next);
        self.free_list.remove(&mut self.region, next);
        self.region.set_tags(bp, size, false);
        bp
      },
      (false, true) => {
        size += self.region.size(prev);
        self.free_list.remove(&mut self.region, prev);
        self.region.set_tags(prev, size, false);
        prev
      },
      (false, false) => {
        size += self.region.size(prev) + self.region.size(next);
        self.free_list.remove(&mut self.region, prev);
        self.free_list.remove(&mut self.region, next);
        self.region.set_tags(prev, size, false);
        prev
      },
    };

    trace!("coalesced free block at offset {bp}, {size} bytes");
    self.free_list.insert_first(&mut self.region, bp);
    bp
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    block::MIN_BLOCK_SIZE,
    heap::{Heap, PROLOGUE},
    source::ArenaSource,
  };

  const FIRST: usize = PROLOGUE + MIN_BLOCK_SIZE;

  /// Three allocated 32-byte blocks at FIRST, FIRST + 32 and FIRST + 64,
  /// followed by a free tail.
  fn three_blocks() -> Heap<ArenaSource> {
    let mut heap = Heap::new(ArenaSource::default()).unwrap();
    heap.extend_heap(128).unwrap();

    for bp in [FIRST, FIRST + 32, FIRST + 64] {
      assert_eq!(heap.free_list.head(), bp);
      heap.place(bp, 32);
    }

    heap
  }

  fn mark_free(
    heap: &mut Heap<ArenaSource>,
    bp: usize,
  ) {
    let size = heap.region.size(bp);
    heap.region.set_tags(bp, size, false);
  }

  #[test]
  fn test_no_free_neighbours() {
    let mut heap = three_blocks();

    mark_free(&mut heap, FIRST + 32);
    assert_eq!(heap.coalesce(FIRST + 32), FIRST + 32);
    assert_eq!(heap.region.size(FIRST + 32), 32);
    assert_eq!(heap.free_list.head(), FIRST + 32);
  }

  #[test]
  fn test_merge_with_right() {
    let mut heap = three_blocks();
    let tail = heap.region.size(FIRST + 96);

    mark_free(&mut heap, FIRST + 64);
    assert_eq!(heap.coalesce(FIRST + 64), FIRST + 64);
    assert_eq!(heap.region.size(FIRST + 64), 32 + tail);
    assert_eq!(heap.free_blocks().count(), 1);
  }

  #[test]
  fn test_merge_with_left() {
    let mut heap = three_blocks();

    mark_free(&mut heap, FIRST);
    heap.coalesce(FIRST);
    mark_free(&mut heap, FIRST + 32);

    assert_eq!(heap.coalesce(FIRST + 32), FIRST);
    assert_eq!(heap.region.size(FIRST), 64);
    assert_eq!(heap.region.tag(FIRST), heap.region.footer_tag(FIRST));
    assert_eq!(heap.free_list.head(), FIRST);
  }

  #[test]
  fn test_merge_both_sides() {
    let mut heap = three_blocks();

    mark_free(&mut heap, FIRST);
    heap.coalesce(FIRST);
    mark_free(&mut heap, FIRST + 64);
    heap.coalesce(FIRST + 64);
    let free_before = heap.free_blocks().count();

    mark_free(&mut heap, FIRST + 32);
    assert_eq!(heap.coalesce(FIRST + 32), FIRST);
    assert_eq!(heap.free_blocks().count(), free_before - 1);
    assert!(heap.blocks().all(|b| !b.allocated));
  }
}
