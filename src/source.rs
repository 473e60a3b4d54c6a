//! Growth primitives backing a heap region.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use libc::{c_void, intptr_t, sbrk};

use crate::{align::ALIGNMENT, error::SourceError};

/// Something that can extend a contiguous memory range.
pub trait MemorySource {
  /// Extends the range by `increment` bytes and returns the previous end.
  ///
  /// `extend(0)` reports the current end without growing.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, SourceError>;
}

/// Grows the process data segment with `sbrk(2)`.
#[derive(Debug)]
pub struct SbrkSource {
  _private: (),
}

impl SbrkSource {
  /// # Safety
  ///
  /// The caller must ensure the program break is not moved by anyone else
  /// (including another `SbrkSource`) while the heap using this source is
  /// alive, and that the heap is used from a single thread.
  pub unsafe fn new() -> Self {
    Self { _private: () }
  }

  /// Current program break.
  pub fn program_break(&self) -> *mut c_void {
    unsafe { sbrk(0) }
  }
}

impl MemorySource for SbrkSource {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, SourceError> {
    let delta = intptr_t::try_from(increment).map_err(|_| SourceError::TooLarge {
      requested: increment,
    })?;

    let address = unsafe { sbrk(delta) };

    if address == usize::MAX as *mut c_void {
      return Err(SourceError::Failed {
        requested: increment,
      });
    }

    NonNull::new(address as *mut u8).ok_or(SourceError::Failed {
      requested: increment,
    })
  }
}

/// A fixed-capacity buffer handed out front to back, the way `sbrk` moves
/// the break. Refuses to grow past its capacity.
#[derive(Debug)]
pub struct ArenaSource {
  start: NonNull<u8>,
  layout: Layout,
  brk: usize,
}

impl ArenaSource {
  /// Capacity used by [`ArenaSource::default`].
  pub const DEFAULT_CAPACITY: usize = 20 * (1 << 20);

  pub fn with_capacity(capacity: usize) -> Self {
    let size = crate::align!(capacity.max(ALIGNMENT));
    let layout = match Layout::from_size_align(size, ALIGNMENT) {
      Ok(layout) => layout,
      Err(_) => panic!("arena capacity {capacity} is too large"),
    };

    let raw = unsafe { alloc::alloc_zeroed(layout) };
    let Some(start) = NonNull::new(raw) else {
      alloc::handle_alloc_error(layout);
    };

    Self {
      start,
      layout,
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.brk
  }
}

impl Default for ArenaSource {
  fn default() -> Self {
    Self::with_capacity(Self::DEFAULT_CAPACITY)
  }
}

impl MemorySource for ArenaSource {
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, SourceError> {
    let available = self.capacity() - self.brk;

    if increment > available {
      return Err(SourceError::Exhausted {
        requested: increment,
        available,
      });
    }

    let old = unsafe { self.start.add(self.brk) };
    self.brk += increment;

    Ok(old)
  }
}

impl Drop for ArenaSource {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.start.as_ptr(), self.layout) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_arena_extend() {
    let mut arena = ArenaSource::with_capacity(64);
    let start = arena.extend(0).unwrap();

    assert_eq!(start.as_ptr() as usize % ALIGNMENT, 0);
    assert_eq!(arena.extend(16).unwrap(), start);
    assert_eq!(arena.extend(16).unwrap().as_ptr() as usize, start.as_ptr() as usize + 16);
    assert_eq!(arena.used(), 32);
  }

  #[test]
  fn test_arena_refuses_past_capacity() {
    let mut arena = ArenaSource::with_capacity(64);
    arena.extend(48).unwrap();

    assert_eq!(
      arena.extend(32),
      Err(SourceError::Exhausted {
        requested: 32,
        available: 16
      })
    );
    assert_eq!(arena.used(), 48);
    assert!(arena.extend(16).is_ok());
  }

  #[test]
  fn test_arena_capacity_rounded() {
    assert_eq!(ArenaSource::with_capacity(0).capacity(), ALIGNMENT);
    assert_eq!(ArenaSource::with_capacity(13).capacity(), 16);
  }
}
