use thiserror::Error;

/// Failures surfaced by [`Heap`](crate::Heap) operations.
///
/// Existing blocks and the free-list table are left exactly as they were
/// before the failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapError {
  #[error("out of memory: region could not grow by {requested} bytes")]
  OutOfMemory { requested: usize },
  #[error("region limit: growing by {requested} bytes exceeds the 4 GiB link range")]
  RegionLimit { requested: usize },
  #[error("program break moved underneath the managed region")]
  Discontiguous,
  #[error("pointer does not name a live block of this heap")]
  InvalidPointer,
  #[error("alignment {align} is not a power of two")]
  InvalidAlignment { align: usize },
}

impl HeapError {
  /// True when the heap could not grow, as opposed to a caller error.
  pub fn is_out_of_memory(&self) -> bool {
    matches!(
      self,
      HeapError::OutOfMemory { .. } | HeapError::RegionLimit { .. } | HeapError::Discontiguous
    )
  }
}

pub type Result<T> = core::result::Result<T, HeapError>;
