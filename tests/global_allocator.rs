//! Runs the whole test binary on a `LockedHeap`, with a logger that allocates
//! on every record.

use std::{
  alloc::Layout,
  cell::UnsafeCell,
  sync::atomic::{AtomicUsize, Ordering},
};

use log::{LevelFilter, Log, Metadata, Record};
use segalloc::{HeapError, LockedHeap, Region};

const CAPACITY: usize = 16 << 20;

#[repr(C, align(4096))]
struct Memory(UnsafeCell<[u8; CAPACITY]>);

// Only reached through the heap mutex.
unsafe impl Sync for Memory {}

static MEMORY: Memory = Memory(UnsafeCell::new([0; CAPACITY]));

/// Region over a static buffer, so the allocator needs no allocator to exist.
struct StaticRegion {
  len: usize,
}

impl Region for StaticRegion {
  fn base(&self) -> *mut u8 {
    MEMORY.0.get().cast()
  }

  fn len(&self) -> usize {
    self.len
  }

  fn grow(
    &mut self,
    incr: usize,
  ) -> segalloc::Result<usize> {
    let old = self.len;
    match old.checked_add(incr) {
      Some(new) if new <= CAPACITY => {
        self.len = new;
        Ok(old)
      }
      _ => Err(HeapError::OutOfMemory { requested: incr }),
    }
  }
}

#[global_allocator]
static HEAP: LockedHeap<StaticRegion> = LockedHeap::new(StaticRegion { len: 0 });

/// Formats every record into a fresh `String`.
struct FormattingLogger {
  records: AtomicUsize,
}

impl Log for FormattingLogger {
  fn enabled(
    &self,
    _metadata: &Metadata,
  ) -> bool {
    true
  }

  fn log(
    &self,
    record: &Record,
  ) {
    let line = format!("{} {}", record.level(), record.args());
    std::hint::black_box(line);
    self.records.fetch_add(1, Ordering::Relaxed);
  }

  fn flush(&self) {}
}

static LOGGER: FormattingLogger = FormattingLogger {
  records: AtomicUsize::new(0),
};

#[test]
fn allocating_logger_does_not_reenter_heap() {
  let _ = log::set_logger(&LOGGER);
  log::set_max_level(LevelFilter::Trace);

  // Large enough to force the heap to grow several times.
  let buffers: Vec<Vec<u8>> = (0..64).map(|i| vec![i as u8; 64 * 1024]).collect();
  for (i, buffer) in buffers.iter().enumerate() {
    assert!(buffer.iter().all(|&byte| byte == i as u8));
  }
  drop(buffers);

  log::info!("heap survived growth under an allocating logger");
  assert!(LOGGER.records.load(Ordering::Relaxed) >= 1);

  let violations = HEAP.lock().check_heap().len();
  assert_eq!(violations, 0);
}

#[test]
fn std_collections_run_on_the_heap() {
  let layout = Layout::from_size_align(148, 16).unwrap();
  let ptr = unsafe { std::alloc::alloc(layout) };
  assert!(!ptr.is_null());
  assert_eq!(ptr as usize % 16, 0);
  let owned = HEAP.lock().contains(ptr);
  assert!(owned);
  unsafe { std::alloc::dealloc(ptr, layout) };

  let mut words: Vec<String> = (0..1000).map(|i| format!("word-{i}")).collect();
  words.sort();
  words.dedup();
  assert_eq!(words.len(), 1000);

  let boxed = Box::new(0x1234_5678_u128);
  assert_eq!((&*boxed as *const u128 as usize) % 16, 0);
}
