//! Fit search across the segregated lists.
//!
//! Small requests take the first block that is large enough, large requests
//! scan their whole bucket for the tightest block. Either way the search
//! starts in the request's own bucket and moves up one size class at a time.

use crate::{
  block::BlockRef,
  heap::Heap,
  region::Region,
  seglist::{NUM_BUCKETS, bucket_for},
};

impl<R: Region> Heap<R> {
  /// Finds a free block of at least `asize` bytes without unlinking it.
  pub(crate) fn find_fit(
    &self,
    asize: usize,
  ) -> Option<BlockRef> {
    (bucket_for(asize)..NUM_BUCKETS).find_map(|bucket| self.fit_in_bucket(bucket, asize))
  }

  fn fit_in_bucket(
    &self,
    bucket: usize,
    asize: usize,
  ) -> Option<BlockRef> {
    if asize < self.config.first_fit_limit {
      return self.bucket_blocks(bucket).find(|&bp| self.size_of(bp) >= asize);
    }

    let mut best: Option<(BlockRef, usize)> = None;
    for bp in self.bucket_blocks(bucket) {
      let size = self.size_of(bp);
      if size == asize {
        return Some(bp);
      }
      if size > asize && best.is_none_or(|(_, best_size)| size < best_size) {
        best = Some((bp, size));
      }
    }

    best.map(|(bp, _)| bp)
  }
}
