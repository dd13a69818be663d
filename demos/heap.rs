use std::{io::Read, ptr};

use segalloc::{ArenaRegion, Heap, Region};

/// Waits until the user presses ENTER, when started with `--step`.
/// Useful to inspect the process with `pmap` or `gdb` between steps.
fn pause(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints where the region lives and how much of it the heap uses.
fn print_region(
  label: &str,
  heap: &Heap<ArenaRegion>,
) {
  let region = heap.region();
  println!(
    "[{}] PID = {}, region base = {:?}, in use = {} of {} bytes",
    label,
    std::process::id(),
    region.base(),
    region.len(),
    region.capacity(),
  );
}

fn print_heap(heap: &Heap<ArenaRegion>) {
  let stats = heap.stats();
  println!(
    "    heap: {} bytes, {} allocated blocks ({} bytes), {} free blocks ({} bytes)",
    stats.heap_size, stats.allocated_blocks, stats.allocated_bytes, stats.free_blocks, stats.free_bytes
  );
  for (block, view) in heap.blocks() {
    println!(
      "      {:#06x} {:>6} {}",
      block.offset(),
      view.size(),
      if view.is_free() { "free" } else { "allocated" }
    );
  }

  for violation in heap.check_heap() {
    println!("    !! {violation}");
  }
}

fn main() -> segalloc::Result<()> {
  simple_logger::SimpleLogger::new()
    .with_level(log::LevelFilter::Debug)
    .init()
    .unwrap();

  let step = std::env::args().any(|arg| arg == "--step");
  let mut heap = Heap::new(ArenaRegion::default());

  unsafe {
    print_region("start", &heap);
    pause(step);

    // 1) A u32: the first allocation also initializes the heap.
    let first = heap.allocate(4)?.unwrap().as_ptr();
    first.cast::<u32>().write(0xDEADBEEF);
    println!("\n[1] allocate(4) = {first:?}, value = 0x{:X}", first.cast::<u32>().read());
    print_heap(&heap);
    pause(step);

    // 2) 12 odd-sized bytes.
    let second = heap.allocate(12)?.unwrap().as_ptr();
    ptr::write_bytes(second, 0xAB, 12);
    println!("\n[2] allocate(12) = {second:?}");
    print_heap(&heap);
    pause(step);

    // 3) Release the first block and ask for 2 bytes: the freed block is reused.
    heap.release(first);
    let third = heap.allocate(2)?.unwrap().as_ptr();
    println!(
      "\n[3] release + allocate(2) = {third:?}, reused the freed block? {}",
      third == first
    );
    print_heap(&heap);
    pause(step);

    // 4) Grow a block past its capacity; the contents move with it.
    let grown = heap.resize(second, 300)?.unwrap().as_ptr();
    println!("\n[4] resize(second, 300) = {grown:?}, first byte = 0x{:X}", grown.read());
    print_heap(&heap);
    pause(step);

    // 5) A large zeroed block forces the heap to grow.
    print_region("before large alloc", &heap);
    let big = heap.allocate_zeroed(64, 1024)?.unwrap().as_ptr();
    println!("\n[5] allocate_zeroed(64, 1024) = {big:?}");
    print_region("after large alloc", &heap);
    print_heap(&heap);
    pause(step);

    // 6) Free everything; the heap coalesces back into a single free block.
    heap.release(third);
    heap.release(grown);
    heap.release(big);
    println!("\n[6] released everything");
    print_heap(&heap);
  }

  Ok(())
}
