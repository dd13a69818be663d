//! Backing memory for a [`Heap`](crate::Heap).
//!
//! A region is one contiguous span that only grows at its high end. The heap
//! never asks for memory anywhere else, so any "give me N more bytes or fail"
//! primitive can back it.

use std::{alloc, ptr};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align,
  block::DSIZE,
  error::{HeapError, Result},
};

/// Default capacity of an [`ArenaRegion`]: 20 MiB.
pub const DEFAULT_ARENA_CAPACITY: usize = 20 * (1 << 20);

/// Growth capability injected into the allocator.
pub trait Region {
  /// Low address of the region. Must be aligned to [`DSIZE`] and must not move
  /// once the region has grown for the first time.
  fn base(&self) -> *mut u8;

  /// Number of bytes currently handed to the heap.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Appends `incr` bytes to the region and returns the previous length,
  /// which is the offset of the first new byte. On failure the region is
  /// unchanged.
  fn grow(
    &mut self,
    incr: usize,
  ) -> Result<usize>;
}

/// Fixed-capacity arena that simulates a growable heap.
///
/// The full capacity is reserved up front, and `grow` only moves the
/// simulated break. Useful for tests and for running several isolated heaps
/// inside one process.
pub struct ArenaRegion {
  base: *mut u8,
  capacity: usize,
  brk: usize,
}

// The arena exclusively owns its allocation.
unsafe impl Send for ArenaRegion {}

impl ArenaRegion {
  /// Reserves `capacity` bytes, rounded up to [`DSIZE`], zero-filled.
  ///
  /// # Panics
  ///
  /// Panics when the rounded capacity exceeds `isize::MAX`, and aborts
  /// through [`handle_alloc_error`](alloc::handle_alloc_error) when the
  /// reservation itself fails.
  pub fn new(capacity: usize) -> Self {
    let capacity = align!(capacity.clamp(DSIZE, isize::MAX as usize));
    let layout = match alloc::Layout::from_size_align(capacity, DSIZE) {
      Ok(layout) => layout,
      Err(_) => panic!("arena capacity {capacity} cannot be laid out"),
    };

    let base = unsafe { alloc::alloc_zeroed(layout) };
    if base.is_null() {
      alloc::handle_alloc_error(layout);
    }

    Self {
      base,
      capacity,
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

impl Default for ArenaRegion {
  fn default() -> Self {
    Self::new(DEFAULT_ARENA_CAPACITY)
  }
}

impl Drop for ArenaRegion {
  fn drop(&mut self) {
    // `new` already validated this layout.
    if let Ok(layout) = alloc::Layout::from_size_align(self.capacity, DSIZE) {
      unsafe { alloc::dealloc(self.base, layout) };
    }
  }
}

impl Region for ArenaRegion {
  fn base(&self) -> *mut u8 {
    self.base
  }

  fn len(&self) -> usize {
    self.brk
  }

  fn grow(
    &mut self,
    incr: usize,
  ) -> Result<usize> {
    let old = self.brk;
    match old.checked_add(incr) {
      Some(new) if new <= self.capacity => {
        self.brk = new;
        Ok(old)
      }
      _ => Err(HeapError::OutOfMemory { requested: incr }),
    }
  }
}

/// Region living at the program break, grown with `sbrk(2)`.
///
/// The base is taken lazily on the first `grow`, aligned up to [`DSIZE`].
/// If something else moves the break between two growths the region is no
/// longer contiguous and growth fails with [`HeapError::Discontiguous`].
pub struct SbrkRegion {
  base: *mut u8,
  len: usize,
}

// The program break is process-wide; callers serialize access through the
// owning heap (see `LockedHeap`).
unsafe impl Send for SbrkRegion {}

impl SbrkRegion {
  pub const fn new() -> Self {
    Self {
      base: ptr::null_mut(),
      len: 0,
    }
  }

  unsafe fn claim_base(&mut self) -> Result<()> {
    unsafe {
      let brk = sbrk(0);
      if brk == usize::MAX as *mut c_void {
        return Err(HeapError::OutOfMemory { requested: 0 });
      }

      let pad = align!(brk as usize) - brk as usize;
      if pad > 0 && sbrk(pad as intptr_t) == usize::MAX as *mut c_void {
        return Err(HeapError::OutOfMemory { requested: pad });
      }

      self.base = (brk as *mut u8).add(pad);
      Ok(())
    }
  }
}

impl Default for SbrkRegion {
  fn default() -> Self {
    Self::new()
  }
}

impl Region for SbrkRegion {
  fn base(&self) -> *mut u8 {
    self.base
  }

  fn len(&self) -> usize {
    self.len
  }

  fn grow(
    &mut self,
    incr: usize,
  ) -> Result<usize> {
    let delta = intptr_t::try_from(incr).map_err(|_| HeapError::OutOfMemory { requested: incr })?;

    unsafe {
      if self.base.is_null() {
        self.claim_base()?;
      }

      let old_brk = sbrk(delta);
      if old_brk == usize::MAX as *mut c_void {
        return Err(HeapError::OutOfMemory { requested: incr });
      }

      if old_brk as *mut u8 != self.base.add(self.len) {
        // Hand the bytes back; they are not adjacent to our region.
        sbrk(-delta);
        return Err(HeapError::Discontiguous);
      }
    }

    let old = self.len;
    self.len += incr;
    Ok(old)
  }
}
