use crate::{
  align,
  block::MIN_BLOCK_SIZE,
};

/// Bytes requested from the region when the heap runs out of fitting blocks.
pub const CHUNK_SIZE: usize = 464;

/// Requests below this adjusted size use first-fit; the rest use best-fit.
pub const FIRST_FIT_LIMIT: usize = 960;

/// Tunables for a [`Heap`](crate::Heap).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum growth step, also used for the initial extension.
  pub chunk_size: usize,
  /// Crossover between first-fit and best-fit search.
  pub first_fit_limit: usize,
  /// Emit `log` records from heap operations. Off for heaps that back the
  /// global allocator, where a logger that allocates would re-enter the heap.
  pub log_operations: bool,
}

impl HeapConfig {
  pub const DEFAULT: Self = Self {
    chunk_size: CHUNK_SIZE,
    first_fit_limit: FIRST_FIT_LIMIT,
    log_operations: true,
  };

  pub const fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub const fn with_first_fit_limit(
    mut self,
    first_fit_limit: usize,
  ) -> Self {
    self.first_fit_limit = first_fit_limit;
    self
  }

  pub const fn with_log_operations(
    mut self,
    log_operations: bool,
  ) -> Self {
    self.log_operations = log_operations;
    self
  }

  /// Growth step rounded to the alignment unit, never below one minimum block.
  pub(crate) fn chunk_bytes(&self) -> usize {
    align!(self.chunk_size.min(u32::MAX as usize)).max(MIN_BLOCK_SIZE)
  }
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self::DEFAULT
  }
}
