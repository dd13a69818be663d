//! Segregated free lists.
//!
//! Free blocks are kept in [`NUM_BUCKETS`] doubly linked lists, one per size
//! class. The list heads live in the heap value; the links live inside the
//! free blocks themselves, as 32-bit payload offsets.
//!
//! ```text
//!   buckets[i] ──► [blk] ⇄ [blk] ⇄ [blk] ──► none
//! ```

use std::iter;

use crate::{
  block::{BlockRef, WSIZE},
  heap::Heap,
  region::Region,
};

pub const NUM_BUCKETS: usize = 14;

/// Lower bounds of buckets `1..NUM_BUCKETS`. Bucket `i` holds the sizes in
/// `[SIZE_CLASSES[i - 1], SIZE_CLASSES[i])`; bucket 0 everything below 16
/// and the last bucket everything from 61440 up.
pub const SIZE_CLASSES: [usize; NUM_BUCKETS - 1] = [
  16, 32, 64, 128, 256, 480, 960, 1920, 3840, 7680, 15360, 30720, 61440,
];

/// Bucket that holds free blocks of `size` bytes.
pub fn bucket_for(size: usize) -> usize {
  SIZE_CLASSES.partition_point(|&threshold| threshold <= size)
}

/// Half-open size range `(low, high)` served by `bucket`; `high` is `None` for
/// the last, unbounded bucket.
pub fn bucket_range(bucket: usize) -> (usize, Option<usize>) {
  let low = match bucket {
    0 => 0,
    _ => SIZE_CLASSES[bucket - 1],
  };
  (low, SIZE_CLASSES.get(bucket).copied())
}

impl<R: Region> Heap<R> {
  /// First block of `bucket`, if any.
  pub fn bucket_head(
    &self,
    bucket: usize,
  ) -> Option<BlockRef> {
    self.buckets[bucket]
  }

  /// Walks `bucket` front to back.
  pub(crate) fn bucket_blocks(
    &self,
    bucket: usize,
  ) -> impl Iterator<Item = BlockRef> + '_ {
    iter::successors(self.buckets[bucket], move |&bp| self.links(bp).next)
  }

  fn set_prev_link(
    &mut self,
    bp: BlockRef,
    prev: Option<BlockRef>,
  ) {
    self.set_word(bp.offset(), BlockRef::encode_link(prev));
  }

  fn set_next_link(
    &mut self,
    bp: BlockRef,
    next: Option<BlockRef>,
  ) {
    self.set_word(bp.offset() + WSIZE, BlockRef::encode_link(next));
  }

  /// Pushes `bp` onto the front of `bucket`.
  pub(crate) fn insert(
    &mut self,
    bucket: usize,
    bp: BlockRef,
  ) {
    let head = self.buckets[bucket];

    self.set_prev_link(bp, None);
    self.set_next_link(bp, head);
    if let Some(head) = head {
      self.set_prev_link(head, Some(bp));
    }

    self.buckets[bucket] = Some(bp);
  }

  /// Files `bp` under the bucket matching its current header size.
  pub(crate) fn push_free(
    &mut self,
    bp: BlockRef,
  ) {
    let bucket = bucket_for(self.size_of(bp));
    self.insert(bucket, bp);
  }

  /// Splices `bp` out of its bucket.
  ///
  /// `bp` must be on a list, and its header must still carry the size it was
  /// filed under.
  pub(crate) fn remove(
    &mut self,
    bp: BlockRef,
  ) {
    let links = self.links(bp);

    match links.prev {
      Some(prev) => self.set_next_link(prev, links.next),
      None => {
        let bucket = bucket_for(self.size_of(bp));
        debug_assert_eq!(self.buckets[bucket], Some(bp), "block is not on its list");
        self.buckets[bucket] = links.next;
      }
    }

    if let Some(next) = links.next {
      self.set_prev_link(next, links.prev);
    }
  }
}
