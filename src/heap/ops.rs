use std::ptr;

use log::{trace, warn};

use super::Heap;
use crate::{
  block::{self, MIN_BLOCK_SIZE, OVERHEAD},
  fit::FitPolicy,
  source::MemorySource,
};

impl<S: MemorySource, P: FitPolicy> Heap<S, P> {
  /// Allocates a block with at least `size` bytes of payload.
  ///
  /// Returns null for a zero-sized request, or when the memory source
  /// cannot grow the heap any further.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let Some(asize) = block::adjusted_size(size) else {
      warn!("allocation of {size} bytes overflows the block size");
      return ptr::null_mut();
    };

    let bp = match self.policy.find_fit(self.free_list.iter(&self.region), asize) {
      Some(bp) => bp,
      None => match self.extend_heap(asize.max(self.config.chunk_size)) {
        Ok(bp) => bp,
        Err(err) => {
          warn!("allocation of {size} bytes failed: {err}");
          return ptr::null_mut();
        },
      },
    };

    self.place(bp, asize);
    trace!("allocated {} bytes at offset {bp}", self.region.size(bp));

    self.region.ptr_at(bp)
  }

  /// Returns the block at `address` to the heap. Null is ignored.
  ///
  /// # Safety
  ///
  /// `address` must be null or a pointer returned by this heap that has not
  /// been freed since.
  pub unsafe fn free(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    let bp = self.block_offset(address);
    self.free_block(bp);
  }

  fn free_block(
    &mut self,
    bp: usize,
  ) {
    let size = self.region.size(bp);
    self.region.set_tags(bp, size, false);
    trace!("freed {size} bytes at offset {bp}");

    self.coalesce(bp);
  }

  /// Resizes the block at `address` to hold at least `size` bytes.
  ///
  /// A null `address` allocates; a zero `size` frees and returns null.
  /// Shrinking happens in place. Growing moves the payload to a new block;
  /// if that allocation fails, null is returned and the old block is left
  /// untouched.
  ///
  /// # Safety
  ///
  /// Same as [`Heap::free`].
  pub unsafe fn resize(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      unsafe { self.free(address) };
      return ptr::null_mut();
    }

    if address.is_null() {
      return self.allocate(size);
    }

    let Some(asize) = block::adjusted_size(size) else {
      warn!("resize to {size} bytes overflows the block size");
      return ptr::null_mut();
    };

    let bp = self.block_offset(address);
    let old_size = self.region.size(bp);

    if asize == old_size {
      return address;
    }

    if asize < old_size {
      let rest = old_size - asize;
      if rest < MIN_BLOCK_SIZE {
        return address;
      }

      self.region.set_tags(bp, asize, true);
      self.region.set_tags(bp + asize, rest, true);
      self.free_block(bp + asize);

      return address;
    }

    let new_address = self.allocate(size);
    if new_address.is_null() {
      return ptr::null_mut();
    }

    let new_bp = self.block_offset(new_address);
    self.region.copy(bp, new_bp, (old_size - OVERHEAD).min(size));
    self.free_block(bp);

    new_address
  }

  /// Allocates `count * size` zeroed bytes.
  ///
  /// Returns null if the multiplication overflows.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let Some(bytes) = count.checked_mul(size) else {
      warn!("zeroed allocation of {count} x {size} bytes overflows");
      return ptr::null_mut();
    };

    let address = self.allocate(bytes);
    if !address.is_null() {
      let bp = self.block_offset(address);
      self.region.fill(bp, bytes, 0);
    }

    address
  }
}
