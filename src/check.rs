//! Heap consistency checker.
//!
//! Walks every block in address order and every free list, and reports each
//! broken invariant it finds. It never writes to the heap and never panics
//! on corrupted metadata: a walk that cannot continue safely stops and
//! reports why.

use thiserror::Error;

use crate::{
  align::is_aligned,
  block::{BlockRef, DSIZE, Header, MIN_BLOCK_SIZE},
  heap::{FIRST_BLOCK, Heap, PROLOGUE},
  region::Region,
  seglist::{NUM_BUCKETS, bucket_range},
};

/// One broken heap invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
  #[error("prologue block is corrupt")]
  Prologue,
  #[error("epilogue marker is corrupt")]
  Epilogue,
  #[error("block {offset:#x} is not aligned")]
  Misaligned { offset: usize },
  #[error("block {offset:#x} of {size} bytes runs outside the region")]
  OutOfRegion { offset: usize, size: usize },
  #[error("block {offset:#x} is only {size} bytes")]
  Undersized { offset: usize, size: usize },
  #[error("free block {offset:#x} header says {header} bytes, footer says {footer}")]
  FooterMismatch {
    offset: usize,
    header: usize,
    footer: usize,
  },
  #[error("blocks {offset:#x} and {next:#x} are both free")]
  AdjacentFree { offset: usize, next: usize },
  #[error("block {offset:#x} has predecessor flag {flag}, predecessor allocated is {actual}")]
  PredecessorFlag {
    offset: usize,
    flag: bool,
    actual: bool,
  },
  #[error("allocated block {offset:#x} is on free list {bucket}")]
  AllocatedInList { offset: usize, bucket: usize },
  #[error("free block {offset:#x} of {size} bytes is on free list {bucket}")]
  WrongBucket {
    offset: usize,
    size: usize,
    bucket: usize,
  },
  #[error("free block {offset:#x} on list {bucket} has a broken back link")]
  BrokenLink { offset: usize, bucket: usize },
  #[error("free list {bucket} does not terminate")]
  ListCycle { bucket: usize },
  #[error("heap walk found {heap} free blocks, free lists hold {lists}")]
  FreeCount { heap: usize, lists: usize },
}

fn fits_bucket(
  size: usize,
  bucket: usize,
) -> bool {
  let (low, high) = bucket_range(bucket);
  size >= low && high.is_none_or(|high| size < high)
}

impl<R: Region> Heap<R> {
  /// Validates every heap invariant and returns the violations found.
  ///
  /// An uninitialized heap has nothing to check and reports no violations.
  pub fn check_heap(&self) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !self.is_initialized() {
      return violations;
    }

    self.check_sentinels(&mut violations);
    let heap_free = self.check_blocks(&mut violations);
    let list_free = self.check_lists(&mut violations);

    if heap_free != list_free {
      violations.push(Violation::FreeCount {
        heap: heap_free,
        lists: list_free,
      });
    }

    violations
  }

  fn check_sentinels(
    &self,
    violations: &mut Vec<Violation>,
  ) {
    let header = self.header(PROLOGUE);
    let footer = Header::decode(self.word(PROLOGUE.offset()));
    if header.size != DSIZE || !header.allocated || footer.size != DSIZE || !footer.allocated {
      violations.push(Violation::Prologue);
    }

    let epilogue = self.header(self.epilogue());
    if epilogue.size != 0 || !epilogue.allocated {
      violations.push(Violation::Epilogue);
    }
  }

  /// Linear walk; returns the number of free blocks seen.
  fn check_blocks(
    &self,
    violations: &mut Vec<Violation>,
  ) -> usize {
    let len = self.region.len();
    let mut free = 0;
    let mut bp = FIRST_BLOCK;
    let mut prev: Option<BlockRef> = None;
    let mut prev_allocated = true;

    loop {
      let offset = bp.offset();
      let header = self.header(bp);

      if header.prev_allocated != prev_allocated {
        violations.push(Violation::PredecessorFlag {
          offset,
          flag: header.prev_allocated,
          actual: prev_allocated,
        });
      }

      if header.size == 0 {
        if offset != len {
          violations.push(Violation::Undersized { offset, size: 0 });
        }
        break;
      }

      if !is_aligned(offset) || !is_aligned(header.size) {
        violations.push(Violation::Misaligned { offset });
        break;
      }

      if offset + header.size > len {
        violations.push(Violation::OutOfRegion {
          offset,
          size: header.size,
        });
        break;
      }

      if header.size < MIN_BLOCK_SIZE {
        violations.push(Violation::Undersized {
          offset,
          size: header.size,
        });
      }

      if !header.allocated {
        free += 1;

        let footer = Header::decode(self.word(bp.footer_offset(header.size)));
        if footer.size != header.size {
          violations.push(Violation::FooterMismatch {
            offset,
            header: header.size,
            footer: footer.size,
          });
        }

        if let Some(prev) = prev.filter(|_| !prev_allocated) {
          violations.push(Violation::AdjacentFree {
            offset: prev.offset(),
            next: offset,
          });
        }
      }

      prev = Some(bp);
      prev_allocated = header.allocated;
      bp = bp.following(header.size);
    }

    free
  }

  /// Walks every bucket; returns the number of listed blocks.
  fn check_lists(
    &self,
    violations: &mut Vec<Violation>,
  ) -> usize {
    let len = self.region.len();
    let max_blocks = len / MIN_BLOCK_SIZE + 1;
    let mut listed = 0;

    for bucket in 0..NUM_BUCKETS {
      let mut prev = None;
      let mut cursor = self.bucket_head(bucket);
      let mut steps = 0;

      while let Some(bp) = cursor {
        let offset = bp.offset();

        steps += 1;
        if steps > max_blocks {
          violations.push(Violation::ListCycle { bucket });
          break;
        }

        if offset < FIRST_BLOCK.offset() || offset + MIN_BLOCK_SIZE > len {
          violations.push(Violation::OutOfRegion { offset, size: 0 });
          break;
        }

        if !is_aligned(offset) {
          violations.push(Violation::Misaligned { offset });
          break;
        }

        let header = self.header(bp);
        if header.allocated {
          violations.push(Violation::AllocatedInList { offset, bucket });
        } else if !fits_bucket(header.size, bucket) {
          violations.push(Violation::WrongBucket {
            offset,
            size: header.size,
            bucket,
          });
        }

        let links = self.links(bp);
        if links.prev != prev {
          violations.push(Violation::BrokenLink { offset, bucket });
        }

        listed += 1;
        prev = Some(bp);
        cursor = links.next;
      }
    }

    listed
  }
}
