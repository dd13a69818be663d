use crate::{
  align,
  block::{BlockRef, Header, MIN_BLOCK_SIZE},
  error::{HeapError, Result},
  heap::Heap,
  region::Region,
};

impl<R: Region> Heap<R> {
  /// Grows the region by at least `bytes` and returns the resulting free
  /// block, already merged with a free block that ended the old heap.
  ///
  /// The new span takes over the old epilogue header and gets a fresh
  /// epilogue at its end.
  pub(crate) fn extend_heap(
    &mut self,
    bytes: usize,
  ) -> Result<BlockRef> {
    let size = align!(bytes).max(MIN_BLOCK_SIZE);

    let fits_links = self
      .region
      .len()
      .checked_add(size)
      .is_some_and(|end| end <= u32::MAX as usize);
    if !fits_links {
      return Err(HeapError::RegionLimit { requested: size });
    }

    let old_len = self.region.grow(size)?;
    let bp = BlockRef::new(old_len);

    let prev_allocated = self.header(bp).prev_allocated;
    self.set_header(bp, Header::new(size, false, prev_allocated));
    self.set_footer(bp, size);
    self.set_header(bp.following(size), Header::new(0, true, false));

    heap_log!(self, debug, "heap grew by {size} bytes to {}", self.region.len());

    self.push_free(bp);
    Ok(self.coalesce(bp))
  }

  /// Grows the heap so that a free block of at least `asize` bytes exists.
  ///
  /// A free block at the end of the heap counts toward the request, so only
  /// the shortfall is taken from the region, rounded up to one chunk.
  pub(crate) fn extend_for(
    &mut self,
    asize: usize,
  ) -> Result<BlockRef> {
    let needed = asize.saturating_sub(self.trailing_free_size());
    self.extend_heap(needed.max(self.config.chunk_bytes()))
  }

  /// Size of the free block right before the epilogue, or 0.
  fn trailing_free_size(&self) -> usize {
    let epilogue = self.epilogue();
    if self.predecessor_allocated(epilogue) {
      0
    } else {
      self.size_of(self.prev_block(epilogue))
    }
  }
}
