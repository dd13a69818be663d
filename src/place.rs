use crate::{
  block::{BlockRef, Header, MIN_BLOCK_SIZE},
  heap::Heap,
  region::Region,
};

impl<R: Region> Heap<R> {
  /// Marks the unlinked free block `bp` allocated for `asize` bytes, splitting
  /// off the tail as a new free block when it can stand on its own.
  pub(crate) fn place(
    &mut self,
    bp: BlockRef,
    asize: usize,
  ) {
    let header = self.header(bp);
    debug_assert!(!header.allocated && header.size >= asize);

    let remainder = header.size - asize;
    if remainder >= MIN_BLOCK_SIZE {
      self.set_header(bp, Header::new(asize, true, header.prev_allocated));

      let rest = bp.following(asize);
      self.set_header(rest, Header::new(remainder, false, true));
      self.set_footer(rest, remainder);
      self.push_free(rest);
    } else {
      self.set_header(bp, Header::new(header.size, true, header.prev_allocated));
      self.set_prev_allocated(bp.following(header.size), true);
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{
    block::{BlockView, Header},
    heap::Heap,
    region::ArenaRegion,
  };

  #[test]
  fn test_split_leaves_free_remainder() {
    let mut heap = Heap::new(ArenaRegion::new(1 << 16));
    let ptr = heap.allocate(100).unwrap().unwrap().as_ptr();
    let bp = heap.block_ref(ptr).unwrap();

    assert_eq!(heap.size_of(bp), 104);

    let rest = bp.following(104);
    match heap.view(rest) {
      BlockView::Free { header, footer, .. } => {
        assert_eq!(header, Header::new(464 - 104, false, true));
        assert_eq!(footer.size, 464 - 104);
      }
      view => panic!("expected a free remainder, got {view:?}"),
    }
    assert!(heap.check_heap().is_empty());
  }

  #[test]
  fn test_small_remainder_is_absorbed() {
    let mut heap = Heap::new(ArenaRegion::new(1 << 16));
    // 464 - 456 leaves 8 bytes, too small for a free block.
    let ptr = heap.allocate(452).unwrap().unwrap().as_ptr();
    let bp = heap.block_ref(ptr).unwrap();

    assert_eq!(heap.size_of(bp), 464);
    assert_eq!(heap.usable_size(ptr), Some(460));
    assert!(heap.predecessor_allocated(heap.epilogue()));
    assert_eq!(heap.stats().free_blocks, 0);
    assert!(heap.check_heap().is_empty());
  }

  #[test]
  fn test_exact_fit_sets_successor_flag() {
    let mut heap = Heap::new(ArenaRegion::new(1 << 16));
    let first = heap.allocate(24).unwrap().unwrap().as_ptr();
    let second = heap.allocate(24).unwrap().unwrap().as_ptr();
    let second_ref = heap.block_ref(second).unwrap();

    unsafe { heap.release(first) };
    assert!(!heap.predecessor_allocated(second_ref));

    let again = heap.allocate(24).unwrap().unwrap().as_ptr();
    assert_eq!(again, first);
    assert!(heap.predecessor_allocated(second_ref));
    assert!(heap.check_heap().is_empty());
  }
}
