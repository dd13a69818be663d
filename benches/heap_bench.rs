//! Allocator benchmarks.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use segalloc::{ArenaRegion, Heap};

fn bench_alloc_free_cycle(c: &mut Criterion) {
  let sizes: &[usize] = &[16, 64, 256, 1024, 4096, 32768];
  let mut group = c.benchmark_group("alloc_free_cycle");

  for &size in sizes {
    group.bench_with_input(BenchmarkId::new("segalloc", size), &size, |b, &sz| {
      let mut heap = Heap::new(ArenaRegion::new(1 << 20));
      b.iter(|| {
        let ptr = heap.allocate(sz).unwrap().unwrap();
        unsafe { heap.release(black_box(ptr.as_ptr())) };
      });
    });
  }
  group.finish();
}

fn bench_alloc_burst(c: &mut Criterion) {
  let mut group = c.benchmark_group("alloc_burst");

  group.bench_function("1000x64B", |b| {
    let mut heap = Heap::new(ArenaRegion::new(1 << 20));
    let mut ptrs = Vec::with_capacity(1000);
    b.iter(|| {
      for _ in 0..1000 {
        ptrs.push(heap.allocate(64).unwrap().unwrap().as_ptr());
      }
      for ptr in ptrs.drain(..) {
        unsafe { heap.release(black_box(ptr)) };
      }
    });
  });

  // Mixed sizes so both the first-fit and best-fit paths run.
  group.bench_function("mixed_1000", |b| {
    let mut heap = Heap::new(ArenaRegion::new(4 << 20));
    let mut ptrs = Vec::with_capacity(1000);
    b.iter(|| {
      for i in 0..1000usize {
        ptrs.push(heap.allocate(16 + (i * 97) % 2000).unwrap().unwrap().as_ptr());
      }
      for ptr in ptrs.iter().skip(1).step_by(2) {
        unsafe { heap.release(*ptr) };
      }
      for ptr in ptrs.drain(..).step_by(2) {
        unsafe { heap.release(ptr) };
      }
    });
  });

  group.finish();
}

criterion_group!(benches, bench_alloc_free_cycle, bench_alloc_burst);
criterion_main!(benches);
