use thiserror::Error;

/// Heap operation result
pub type HeapResult<T> = Result<T, HeapError>;

/// Failures of the growth primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
  #[error("memory source exhausted: requested {requested} bytes, {available} bytes left")]
  Exhausted { requested: usize, available: usize },

  #[error("program break could not be moved by {requested} bytes")]
  Failed { requested: usize },

  #[error("growth request of {requested} bytes exceeds the addressable range")]
  TooLarge { requested: usize },
}

/// Heap errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
  #[error(transparent)]
  Source(#[from] SourceError),

  #[error("memory source returned 0x{actual:x}, expected the region end 0x{expected:x}")]
  Discontiguous { expected: usize, actual: usize },

  #[error("request of {requested} bytes overflows the block size")]
  SizeOverflow { requested: usize },
}
