//! Boundary-tag coalescing.
//!
//! ```text
//!   prev free, next free:
//!
//!   ┌──────┬─────────┬──────┐        ┌────────────────────────┐
//!   │ prev │   bp    │ next │  ───►  │          prev          │
//!   └──────┴─────────┴──────┘        └────────────────────────┘
//! ```
//!
//! The predecessor's state comes from `bp`'s own header flag, its size from
//! the footer right before `bp`. The successor is found through `bp`'s size.

use crate::{
  block::{BlockRef, Header},
  heap::Heap,
  region::Region,
};

impl<R: Region> Heap<R> {
  /// Merges the free block `bp` with any free neighbors and returns the
  /// merged block. `bp` must already be on its free list.
  pub(crate) fn coalesce(
    &mut self,
    bp: BlockRef,
  ) -> BlockRef {
    let header = self.header(bp);
    let next = bp.following(header.size);
    let next_header = self.header(next);

    match (header.prev_allocated, next_header.allocated) {
      (true, true) => bp,
      (true, false) => {
        self.remove(bp);
        self.remove(next);

        let size = header.size + next_header.size;
        self.set_header(bp, Header::new(size, false, header.prev_allocated));
        self.set_footer(bp, size);
        self.push_free(bp);
        bp
      }
      (false, true) => {
        let prev = self.prev_block(bp);
        let prev_header = self.header(prev);
        self.remove(bp);
        self.remove(prev);

        let size = prev_header.size + header.size;
        self.set_header(prev, Header::new(size, false, prev_header.prev_allocated));
        self.set_footer(prev, size);
        self.push_free(prev);
        prev
      }
      (false, false) => {
        let prev = self.prev_block(bp);
        let prev_header = self.header(prev);
        self.remove(prev);
        self.remove(bp);
        self.remove(next);

        let size = prev_header.size + header.size + next_header.size;
        self.set_header(prev, Header::new(size, false, prev_header.prev_allocated));
        self.set_footer(prev, size);
        self.push_free(prev);
        prev
      }
    }
  }
}
