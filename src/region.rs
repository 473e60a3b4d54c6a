use std::ptr::{self, NonNull};

use crate::{
  block::{self, Block, NEXT_LINK, PREV_LINK, Tag, WORD},
  error::{HeapError, HeapResult},
  source::MemorySource,
};

/// The managed byte range. All raw memory access of the heap goes through
/// these offset-based accessors, which assert that every access stays
/// inside the range.
#[derive(Debug)]
pub(crate) struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// Creates an empty region starting at `base`.
  pub fn new(base: NonNull<u8>) -> Self {
    Self { base, len: 0 }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Extends the region by `increment` bytes through `source`.
  ///
  /// Returns the offset of the old end. Nothing is written.
  pub fn grow<S: MemorySource>(
    &mut self,
    source: &mut S,
    increment: usize,
  ) -> HeapResult<usize> {
    let old_end = source.extend(increment)?;
    let expected = self.base.as_ptr() as usize + self.len;

    if old_end.as_ptr() as usize != expected {
      return Err(HeapError::Discontiguous {
        expected,
        actual: old_end.as_ptr() as usize,
      });
    }

    let offset = self.len;
    self.len += increment;
    Ok(offset)
  }

  /// Returns true if `len` bytes at `offset` are inside the region.
  pub fn contains(
    &self,
    offset: usize,
    len: usize,
  ) -> bool {
    offset.checked_add(len).is_some_and(|end| end <= self.len)
  }

  pub fn read(
    &self,
    offset: usize,
  ) -> usize {
    self.assert_word(offset);
    unsafe { self.base.as_ptr().add(offset).cast::<u64>().read() as usize }
  }

  pub fn write(
    &mut self,
    offset: usize,
    value: usize,
  ) {
    self.assert_word(offset);
    unsafe { self.base.as_ptr().add(offset).cast::<u64>().write(value as u64) }
  }

  fn assert_word(
    &self,
    offset: usize,
  ) {
    assert!(
      offset % WORD == 0 && self.contains(offset, WORD),
      "word access at offset {offset} outside region of {} bytes",
      self.len
    );
  }

  /// Header tag of the block at `bp`.
  pub fn tag(
    &self,
    bp: usize,
  ) -> Tag {
    Tag::from_raw(self.read(block::header(bp)))
  }

  /// Footer tag of the block at `bp`, located through its header size.
  pub fn footer_tag(
    &self,
    bp: usize,
  ) -> Tag {
    Tag::from_raw(self.read(block::footer(bp, self.tag(bp).size())))
  }

  /// Writes matching header and footer tags for the block at `bp`.
  pub fn set_tags(
    &mut self,
    bp: usize,
    size: usize,
    allocated: bool,
  ) {
    let tag = Tag::new(size, allocated);
    self.write(block::header(bp), tag.raw());
    self.write(block::footer(bp, size), tag.raw());
  }

  pub fn size(
    &self,
    bp: usize,
  ) -> usize {
    self.tag(bp).size()
  }

  pub fn is_allocated(
    &self,
    bp: usize,
  ) -> bool {
    self.tag(bp).is_allocated()
  }

  /// Block following `bp` in address order.
  pub fn next_block(
    &self,
    bp: usize,
  ) -> usize {
    bp + self.size(bp)
  }

  /// Footer tag of the block preceding `bp`.
  pub fn prev_footer_tag(
    &self,
    bp: usize,
  ) -> Tag {
    Tag::from_raw(self.read(block::prev_footer(bp)))
  }

  /// Block preceding `bp` in address order, found through its footer.
  pub fn prev_block(
    &self,
    bp: usize,
  ) -> usize {
    bp - self.prev_footer_tag(bp).size()
  }

  pub fn prev_link(
    &self,
    bp: usize,
  ) -> usize {
    self.read(bp + PREV_LINK)
  }

  pub fn next_link(
    &self,
    bp: usize,
  ) -> usize {
    self.read(bp + NEXT_LINK)
  }

  pub fn set_prev_link(
    &mut self,
    bp: usize,
    prev: usize,
  ) {
    self.write(bp + PREV_LINK, prev);
  }

  pub fn set_next_link(
    &mut self,
    bp: usize,
    next: usize,
  ) {
    self.write(bp + NEXT_LINK, next);
  }

  /// Decodes the block at `bp` according to its header.
  pub fn block(
    &self,
    bp: usize,
  ) -> Block {
    let tag = self.tag(bp);

    if tag.is_allocated() {
      Block::Allocated { size: tag.size() }
    } else {
      Block::Free {
        size: tag.size(),
        prev: self.prev_link(bp),
        next: self.next_link(bp),
      }
    }
  }

  /// Address of the byte at `offset`.
  pub fn ptr_at(
    &self,
    offset: usize,
  ) -> *mut u8 {
    assert!(offset <= self.len, "offset {offset} outside region");
    unsafe { self.base.as_ptr().add(offset) }
  }

  /// Offset of `ptr` inside the region, if it points into it.
  pub fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    let offset = (ptr as usize).checked_sub(self.base.as_ptr() as usize)?;
    (offset < self.len).then_some(offset)
  }

  pub fn fill(
    &mut self,
    offset: usize,
    len: usize,
    byte: u8,
  ) {
    assert!(self.contains(offset, len), "fill outside region");
    unsafe { ptr::write_bytes(self.base.as_ptr().add(offset), byte, len) }
  }

  pub fn copy(
    &mut self,
    src: usize,
    dst: usize,
    len: usize,
  ) {
    assert!(self.contains(src, len) && self.contains(dst, len), "copy outside region");
    unsafe {
      ptr::copy(
        self.base.as_ptr().add(src),
        self.base.as_ptr().add(dst),
        len,
      )
    }
  }
}
