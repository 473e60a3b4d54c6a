use super::Heap;
use crate::{block::MIN_BLOCK_SIZE, fit::FitPolicy, source::MemorySource};

impl<S: MemorySource, P: FitPolicy> Heap<S, P> {
  /// Allocates `asize` bytes at the start of the free block `bp`, splitting
  /// off the remainder when it can stand as a block of its own.
  pub(crate) fn place(
    &mut self,
    bp: usize,
    asize: usize,
  ) {
    let csize = self.region.size(bp);
    debug_assert!(csize >= asize, "block of {csize} bytes cannot hold {asize}");

    self.free_list.remove(&mut self.region, bp);

    if csize - asize >= MIN_BLOCK_SIZE {
      self.region.set_tags(bp, asize, true);

      let rest = bp + asize;
      self.region.set_tags(rest, csize - asize, false);
      self.coalesce(rest);
    } else {
      self.region.set_tags(bp, csize, true);
    }
  }
}
