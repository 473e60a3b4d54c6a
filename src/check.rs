//! Heap consistency checker.
//!
//! Walks the heap in address order and the free list from its head, and
//! reports every broken invariant it finds instead of stopping at the first.
//! Reads are bounds-checked so a corrupted heap yields violations, not a
//! panic.

use log::debug;
use thiserror::Error;

use crate::{
  align::ALIGNMENT,
  block::{self, Block, MIN_BLOCK_SIZE, OVERHEAD, Tag, WORD},
  fit::FitPolicy,
  heap::{Heap, PROLOGUE},
  source::MemorySource,
};

/// A broken heap invariant. Offsets are relative to the heap start.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
  #[error("bad prologue header: size {size}, allocated {allocated}")]
  BadPrologue { size: usize, allocated: bool },

  #[error("bad epilogue header at offset {offset}: size {size}, allocated {allocated}")]
  BadEpilogue {
    offset: usize,
    size: usize,
    allocated: bool,
  },

  #[error("block at offset {offset} is not doubleword aligned")]
  Misaligned { offset: usize },

  #[error("block at offset {offset}: header {header:#x} does not match footer {footer:#x}")]
  TagMismatch {
    offset: usize,
    header: usize,
    footer: usize,
  },

  #[error("block at offset {offset} has size {size}, below the minimum block size")]
  Undersized { offset: usize, size: usize },

  #[error("block at offset {offset} extends past the end of the heap")]
  OutOfBounds { offset: usize },

  #[error("adjacent free blocks at offsets {left} and {right}")]
  Uncoalesced { left: usize, right: usize },

  #[error("free block at offset {offset} links back to {prev}, expected {expected}")]
  BrokenLink {
    offset: usize,
    prev: usize,
    expected: usize,
  },

  #[error("free list ends at offset {offset} instead of the prologue")]
  BadTerminator { offset: usize },

  #[error("free list does not terminate")]
  FreeListCycle,

  #[error("free list holds {listed} blocks, the heap has {free} free blocks")]
  FreeCountMismatch { listed: usize, free: usize },
}

impl<S: MemorySource, P: FitPolicy> Heap<S, P> {
  /// Verifies the heap invariants and returns every violation found.
  ///
  /// With `verbose`, each visited block is logged at debug level.
  pub fn check(
    &self,
    verbose: bool,
  ) -> Vec<Violation> {
    let mut violations = Vec::new();

    if verbose {
      debug!("heap ({:p}):", self.region.ptr_at(0));
    }

    let prologue = self.region.tag(PROLOGUE);
    if prologue.size() != MIN_BLOCK_SIZE || !prologue.is_allocated() {
      violations.push(Violation::BadPrologue {
        size: prologue.size(),
        allocated: prologue.is_allocated(),
      });
      return violations;
    }
    self.check_block(PROLOGUE, &mut violations);

    let free = self.check_blocks(verbose, &mut violations);
    self.check_free_list(verbose, free, &mut violations);

    violations
  }

  /// Address-ordered walk from the prologue to the epilogue. Returns the
  /// number of free blocks seen.
  fn check_blocks(
    &self,
    verbose: bool,
    violations: &mut Vec<Violation>,
  ) -> usize {
    let mut bp = PROLOGUE + MIN_BLOCK_SIZE;
    let mut prev_free = None;
    let mut free = 0;

    loop {
      let Some(tag) = self.tag_at(bp) else {
        violations.push(Violation::OutOfBounds { offset: bp });
        return free;
      };

      if tag.size() == 0 {
        if verbose {
          debug!("{:p}: EOL", self.region.ptr_at(bp));
        }
        if !tag.is_allocated() || block::header(bp) + WORD != self.region.len() {
          violations.push(Violation::BadEpilogue {
            offset: bp,
            size: tag.size(),
            allocated: tag.is_allocated(),
          });
        }
        return free;
      }

      if verbose {
        self.log_block(bp);
      }
      if !self.check_block(bp, violations) {
        return free;
      }

      if tag.is_allocated() {
        prev_free = None;
      } else {
        free += 1;
        if let Some(left) = prev_free {
          violations.push(Violation::Uncoalesced { left, right: bp });
        }
        prev_free = Some(bp);
      }

      let Some(next) = bp.checked_add(tag.size()) else {
        violations.push(Violation::OutOfBounds { offset: bp });
        return free;
      };
      bp = next;
    }
  }

  fn check_free_list(
    &self,
    verbose: bool,
    free: usize,
    violations: &mut Vec<Violation>,
  ) {
    let limit = self.region.len() / MIN_BLOCK_SIZE;
    let mut bp = self.free_list.head();
    let mut expected_prev = PROLOGUE;
    let mut listed = 0;

    loop {
      if bp % ALIGNMENT != 0 {
        violations.push(Violation::Misaligned { offset: bp });
        return;
      }

      let Some(tag) = self.tag_at(bp) else {
        violations.push(Violation::OutOfBounds { offset: bp });
        return;
      };

      if tag.is_allocated() {
        if bp != PROLOGUE {
          violations.push(Violation::BadTerminator { offset: bp });
        }
        break;
      }

      listed += 1;
      if listed > limit {
        violations.push(Violation::FreeListCycle);
        return;
      }

      if verbose {
        self.log_block(bp);
      }
      if !self.check_block(bp, violations) || !self.region.contains(bp, 2 * WORD) {
        return;
      }

      let (prev, next) = match self.region.block(bp) {
        Block::Free { prev, next, .. } => (prev, next),
        Block::Allocated { .. } => break,
      };
      if prev != expected_prev {
        violations.push(Violation::BrokenLink {
          offset: bp,
          prev,
          expected: expected_prev,
        });
      }

      expected_prev = bp;
      bp = next;
    }

    if listed != free {
      violations.push(Violation::FreeCountMismatch { listed, free });
    }
  }

  /// Per-block checks. Returns false if the block cannot be walked past.
  fn check_block(
    &self,
    bp: usize,
    violations: &mut Vec<Violation>,
  ) -> bool {
    if (self.region.ptr_at(bp) as usize) % ALIGNMENT != 0 {
      violations.push(Violation::Misaligned { offset: bp });
    }

    let header = self.region.tag(bp);
    if header.size() < MIN_BLOCK_SIZE {
      violations.push(Violation::Undersized {
        offset: bp,
        size: header.size(),
      });
      return false;
    }

    let in_bounds = bp
      .checked_add(header.size())
      .and_then(|end| end.checked_sub(OVERHEAD))
      .is_some_and(|footer| self.region.contains(footer, WORD));
    if !in_bounds {
      violations.push(Violation::OutOfBounds { offset: bp });
      return false;
    }

    let footer = self.region.footer_tag(bp).raw();
    if header.raw() != footer {
      violations.push(Violation::TagMismatch {
        offset: bp,
        header: header.raw(),
        footer,
      });
    }

    true
  }

  /// Header of the block at `bp`, if it lies inside the region.
  fn tag_at(
    &self,
    bp: usize,
  ) -> Option<Tag> {
    let header = bp.checked_sub(WORD)?;
    (bp % WORD == 0 && self.region.contains(header, WORD)).then(|| self.region.tag(bp))
  }

  fn log_block(
    &self,
    bp: usize,
  ) {
    let header = self.region.tag(bp);
    let footer = bp
      .checked_add(header.size())
      .and_then(|end| end.checked_sub(OVERHEAD))
      .filter(|&footer| self.region.contains(footer, WORD))
      .map(|footer| Tag::from_raw(self.region.read(footer)));

    let state = |tag: Tag| if tag.is_allocated() { 'a' } else { 'f' };
    match footer {
      Some(footer) => debug!(
        "{:p}: header: [{}:{}] footer: [{}:{}]",
        self.region.ptr_at(bp),
        header.size(),
        state(header),
        footer.size(),
        state(footer)
      ),
      None => debug!(
        "{:p}: header: [{}:{}] footer: out of bounds",
        self.region.ptr_at(bp),
        header.size(),
        state(header)
      ),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::ArenaSource;

  fn heap() -> Heap<ArenaSource> {
    Heap::new(ArenaSource::default()).unwrap()
  }

  #[test]
  fn test_fresh_heap_is_clean() {
    let heap = heap();
    assert_eq!(heap.check(true), Vec::<Violation>::new());
  }

  #[test]
  fn test_reports_bad_prologue() {
    let mut heap = heap();
    heap.region.set_tags(PROLOGUE, MIN_BLOCK_SIZE, false);

    assert_eq!(
      heap.check(false),
      vec![Violation::BadPrologue {
        size: MIN_BLOCK_SIZE,
        allocated: false
      }]
    );
  }

  #[test]
  fn test_reports_footer_mismatch() {
    let mut heap = heap();
    let ptr = heap.allocate(64);
    let bp = heap.region.offset_of(ptr).unwrap();
    let size = heap.region.size(bp);

    heap.region.write(block::footer(bp, size), Tag::new(size, false).raw());

    assert_eq!(
      heap.check(false),
      vec![Violation::TagMismatch {
        offset: bp,
        header: Tag::new(size, true).raw(),
        footer: Tag::new(size, false).raw(),
      }]
    );
  }

  #[test]
  fn test_reports_uncoalesced_neighbours() {
    let mut heap = heap();
    let a = heap.allocate(16);
    let b = heap.allocate(16);
    let a = heap.region.offset_of(a).unwrap();
    let b = heap.region.offset_of(b).unwrap();

    // Free both without coalescing.
    for bp in [a, b] {
      heap.region.set_tags(bp, 32, false);
      heap.free_list.insert_first(&mut heap.region, bp);
    }

    assert_eq!(
      heap.check(false),
      vec![Violation::Uncoalesced { left: a, right: b }]
    );
  }

  #[test]
  fn test_reports_free_block_missing_from_list() {
    let mut heap = heap();
    let ptr = heap.allocate(16);
    let bp = heap.region.offset_of(ptr).unwrap();

    heap.region.set_tags(bp, 32, false);

    assert_eq!(
      heap.check(false),
      vec![Violation::FreeCountMismatch { listed: 0, free: 1 }]
    );
  }

  #[test]
  fn test_reports_broken_back_link() {
    let mut heap = heap();
    let a = heap.allocate(16);
    let _b = heap.allocate(16);
    let c = heap.allocate(16);
    unsafe {
      heap.free(a);
      heap.free(c);
    }

    let head = heap.free_list.head();
    let second = heap.region.next_link(head);
    heap.region.set_prev_link(second, 0);

    assert_eq!(
      heap.check(false),
      vec![Violation::BrokenLink {
        offset: second,
        prev: 0,
        expected: head
      }]
    );
  }

  #[test]
  fn test_reports_free_list_cycle() {
    let mut heap = heap();
    let head = heap.free_list.head();
    heap.region.set_next_link(head, head);
    heap.region.set_prev_link(head, head);

    let violations = heap.check(false);
    assert!(violations.contains(&Violation::FreeListCycle));
  }

  #[test]
  fn test_reports_huge_header_size() {
    let mut heap = heap();
    let ptr = heap.allocate(16);
    let bp = heap.region.offset_of(ptr).unwrap();

    heap.region.write(block::header(bp), usize::MAX);

    assert_eq!(heap.check(true), vec![Violation::OutOfBounds { offset: bp }]);
  }

  #[test]
  fn test_reports_misaligned_free_link() {
    let mut heap = heap();
    let head = heap.free_list.head();
    heap.region.set_next_link(head, head + 4);

    assert_eq!(
      heap.check(false),
      vec![Violation::Misaligned { offset: head + 4 }]
    );
  }

  #[test]
  fn test_violation_messages() {
    assert_eq!(
      Violation::Uncoalesced { left: 40, right: 72 }.to_string(),
      "adjacent free blocks at offsets 40 and 72"
    );
    assert_eq!(Violation::FreeListCycle.to_string(), "free list does not terminate");
  }
}
