use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
};

use parking_lot::{Mutex, MutexGuard};

use crate::{
  block::DSIZE,
  config::HeapConfig,
  error::Result,
  heap::Heap,
  region::Region,
};

/// A [`Heap`] behind a mutex, usable as a `#[global_allocator]`.
///
/// The wrapped heap runs with `log_operations` off: a logger that allocates
/// would otherwise call back into the allocator from inside an operation.
///
/// ```rust,ignore
/// use segalloc::{LockedHeap, SbrkRegion};
///
/// #[global_allocator]
/// static HEAP: LockedHeap<SbrkRegion> = LockedHeap::new(SbrkRegion::new());
/// ```
pub struct LockedHeap<R: Region> {
  heap: Mutex<Heap<R>>,
}

impl<R: Region> LockedHeap<R> {
  pub const fn new(region: R) -> Self {
    Self::with_config(region, HeapConfig::DEFAULT)
  }

  pub const fn with_config(
    region: R,
    config: HeapConfig,
  ) -> Self {
    Self {
      heap: Mutex::new(Heap::with_config(region, config.with_log_operations(false))),
    }
  }

  /// Locks the heap for direct use.
  pub fn lock(&self) -> MutexGuard<'_, Heap<R>> {
    self.heap.lock()
  }

  fn into_raw(result: Result<Option<NonNull<u8>>>) -> *mut u8 {
    match result {
      Ok(Some(ptr)) => ptr.as_ptr(),
      Ok(None) | Err(_) => ptr::null_mut(),
    }
  }
}

unsafe impl<R: Region + Send> GlobalAlloc for LockedHeap<R> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    let result = self.heap.lock().allocate_aligned(layout.size(), layout.align());
    Self::into_raw(result)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    let mut heap = self.heap.lock();
    unsafe { heap.release(ptr) }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    let result = {
      let mut heap = self.heap.lock();
      if layout.align() <= DSIZE {
        heap.allocate_zeroed(1, layout.size())
      } else {
        heap.allocate_aligned(layout.size(), layout.align())
      }
    };

    let ptr = Self::into_raw(result);
    if layout.align() > DSIZE && !ptr.is_null() {
      unsafe { ptr::write_bytes(ptr, 0, layout.size()) };
    }
    ptr
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    let result = unsafe { self.heap.lock().resize_aligned(ptr, new_size, layout.align()) };
    Self::into_raw(result)
  }
}

#[cfg(test)]
mod tests {
  use std::{sync::Arc, thread};

  use super::*;
  use crate::region::ArenaRegion;

  #[test]
  fn test_global_alloc_contract() {
    let heap = LockedHeap::new(ArenaRegion::new(1 << 16));

    unsafe {
      let layout = Layout::array::<u32>(8).unwrap();
      let ptr = heap.alloc(layout) as *mut u32;
      assert!(!ptr.is_null());
      assert_eq!(ptr as usize % layout.align(), 0);

      for i in 0..8 {
        ptr.add(i).write(i as u32);
      }

      let grown = heap.realloc(ptr as *mut u8, layout, 128) as *mut u32;
      for i in 0..8 {
        assert_eq!(grown.add(i).read(), i as u32);
      }

      let zeroed = heap.alloc_zeroed(Layout::new::<[u8; 40]>());
      assert!((0..40).all(|i| zeroed.add(i).read() == 0));

      heap.dealloc(grown as *mut u8, Layout::array::<u32>(32).unwrap());
      heap.dealloc(zeroed, Layout::new::<[u8; 40]>());
    }

    assert!(heap.lock().check_heap().is_empty());
    assert_eq!(heap.lock().stats().allocated_blocks, 0);
  }

  #[test]
  fn test_honors_large_alignments() {
    let heap = LockedHeap::new(ArenaRegion::new(1 << 16));

    for align in [16, 32, 64, 4096] {
      for size in [1, 24, 148, 1000] {
        let layout = Layout::from_size_align(size, align).unwrap();
        unsafe {
          let ptr = heap.alloc(layout);
          assert!(!ptr.is_null(), "size {size} align {align}");
          assert_eq!(ptr as usize % align, 0);
          ptr.write_bytes(0xC3, size);

          let zeroed = heap.alloc_zeroed(layout);
          assert_eq!(zeroed as usize % align, 0);
          assert!((0..size).all(|i| zeroed.add(i).read() == 0));

          let grown = heap.realloc(ptr, layout, size + 100);
          assert_eq!(grown as usize % align, 0);
          assert!((0..size).all(|i| grown.add(i).read() == 0xC3));

          heap.dealloc(grown, layout);
          heap.dealloc(zeroed, layout);
        }
        assert!(heap.lock().check_heap().is_empty());
      }
    }

    assert_eq!(heap.lock().stats().allocated_blocks, 0);
  }

  #[test]
  fn test_wrapped_heap_does_not_log() {
    let config = HeapConfig::DEFAULT.with_chunk_size(1024);
    let heap = LockedHeap::with_config(ArenaRegion::new(1 << 16), config);

    let guard = heap.lock();
    assert!(!guard.config().log_operations);
    assert_eq!(guard.config().chunk_size, 1024);
  }

  #[test]
  fn test_serializes_threads() {
    let heap = Arc::new(LockedHeap::new(ArenaRegion::new(1 << 20)));

    let workers: Vec<_> = (0..4)
      .map(|t| {
        let heap = Arc::clone(&heap);
        thread::spawn(move || {
          for round in 0..100 {
            let size = 8 + (t * 31 + round * 7) % 200;
            let layout = Layout::from_size_align(size, 8).unwrap();
            unsafe {
              let ptr = heap.alloc(layout);
              assert!(!ptr.is_null());
              ptr.write_bytes(t as u8, size);
              assert!((0..size).all(|i| ptr.add(i).read() == t as u8));
              heap.dealloc(ptr, layout);
            }
          }
        })
      })
      .collect();

    for worker in workers {
      worker.join().unwrap();
    }

    assert!(heap.lock().check_heap().is_empty());
    assert_eq!(heap.lock().stats().allocated_blocks, 0);
  }
}
