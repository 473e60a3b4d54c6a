use crate::free_list::FreeBlocks;

/// Chooses which free block satisfies a request.
pub trait FitPolicy {
  /// Returns the offset of a block from `free_blocks` whose size is at least
  /// `asize`, or `None` to make the heap grow.
  fn find_fit(
    &self,
    free_blocks: FreeBlocks<'_>,
    asize: usize,
  ) -> Option<usize>;
}

/// First block in free-list order that is large enough.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl FitPolicy for FirstFit {
  fn find_fit(
    &self,
    mut free_blocks: FreeBlocks<'_>,
    asize: usize,
  ) -> Option<usize> {
    free_blocks.find(|block| block.size >= asize).map(|block| block.offset)
  }
}

/// Smallest block that is large enough; stops early on an exact fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestFit;

impl FitPolicy for BestFit {
  fn find_fit(
    &self,
    free_blocks: FreeBlocks<'_>,
    asize: usize,
  ) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;

    for block in free_blocks.filter(|block| block.size >= asize) {
      if block.size == asize {
        return Some(block.offset);
      }
      if best.is_none_or(|(_, size)| block.size < size) {
        best = Some((block.offset, block.size));
      }
    }

    best.map(|(offset, _)| offset)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    free_list::FreeList,
    region::Region,
    source::{ArenaSource, MemorySource},
  };

  /// Free blocks of 56, 32 and 48 bytes, listed in that order.
  fn setup() -> (ArenaSource, Region, FreeList) {
    let mut arena = ArenaSource::with_capacity(256);
    let mut region = Region::new(arena.extend(0).unwrap());
    region.grow(&mut arena, 192).unwrap();
    region.set_tags(8, 32, true);

    let mut list = FreeList::new(8);
    for (bp, size) in [(128, 48), (96, 32), (40, 56)] {
      region.set_tags(bp, size, false);
      list.insert_first(&mut region, bp);
    }

    (arena, region, list)
  }

  #[test]
  fn test_first_fit_takes_first_large_enough() {
    let (_arena, region, list) = setup();

    assert_eq!(FirstFit.find_fit(list.iter(&region), 32), Some(40));
    assert_eq!(FirstFit.find_fit(list.iter(&region), 56), Some(40));
    assert_eq!(FirstFit.find_fit(list.iter(&region), 64), None);
  }

  #[test]
  fn test_best_fit_takes_smallest() {
    let (_arena, region, list) = setup();

    assert_eq!(BestFit.find_fit(list.iter(&region), 32), Some(96));
    assert_eq!(BestFit.find_fit(list.iter(&region), 40), Some(128));
    assert_eq!(BestFit.find_fit(list.iter(&region), 64), None);
  }
}
