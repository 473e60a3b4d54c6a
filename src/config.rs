use crate::block::MIN_BLOCK_SIZE;

/// Tunables of a [`Heap`](crate::Heap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes requested from the memory source per growth,
  /// including the initial one.
  pub chunk_size: usize,
}

impl HeapConfig {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      chunk_size: MIN_BLOCK_SIZE,
    }
  }
}
