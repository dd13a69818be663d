//! The allocator instance and its public operations.

use std::ptr::{self, NonNull};

use crate::{
  align,
  align::is_aligned,
  block::{self, BlockRef, BlockView, DSIZE, Header, Links, MIN_BLOCK_SIZE, WSIZE},
  config::HeapConfig,
  error::{HeapError, Result},
  region::Region,
  seglist::NUM_BUCKETS,
};

/// Payload of the prologue sentinel.
pub(crate) const PROLOGUE: BlockRef = BlockRef::new(DSIZE);

/// Payload of the first real block.
pub(crate) const FIRST_BLOCK: BlockRef = BlockRef::new(2 * DSIZE);

/// Segregated-fit heap over a single growable region.
///
/// The heap is single-threaded; wrap it in a
/// [`LockedHeap`](crate::LockedHeap) to share it.
pub struct Heap<R: Region> {
  pub(crate) region: R,
  pub(crate) buckets: [Option<BlockRef>; NUM_BUCKETS],
  pub(crate) config: HeapConfig,
  initialized: bool,
}

/// Counters gathered by a linear walk of the heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
}

/// Block size needed for a `size`-byte payload: header included, rounded to
/// the alignment unit, never below [`MIN_BLOCK_SIZE`].
pub(crate) fn adjusted_size(size: usize) -> Option<usize> {
  if size <= DSIZE {
    Some(MIN_BLOCK_SIZE)
  } else {
    size
      .checked_add(WSIZE + DSIZE - 1)
      .map(|padded| padded / DSIZE * DSIZE)
  }
}

impl<R: Region> Heap<R> {
  /// Creates an uninitialized heap. The region must be empty.
  pub const fn new(region: R) -> Self {
    Self::with_config(region, HeapConfig::DEFAULT)
  }

  pub const fn with_config(
    region: R,
    config: HeapConfig,
  ) -> Self {
    Self {
      region,
      buckets: [None; NUM_BUCKETS],
      config,
      initialized: false,
    }
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn region(&self) -> &R {
    &self.region
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized
  }

  /// Bytes currently taken from the region, sentinels included.
  pub fn heap_size(&self) -> usize {
    self.region.len()
  }

  /// Lays down the prologue and epilogue around one free chunk.
  ///
  /// Called implicitly by the first [`allocate`](Self::allocate); calling it
  /// again is a no-op. The sentinels and the first chunk come from a single
  /// `grow`, so a failure leaves the heap uninitialized and the region empty.
  pub fn init(&mut self) -> Result<()> {
    if self.initialized {
      return Ok(());
    }

    let chunk = self.config.chunk_bytes();
    let span = 2 * DSIZE + chunk;
    if span > u32::MAX as usize {
      return Err(HeapError::RegionLimit { requested: span });
    }

    let start = self.region.grow(span)?;
    debug_assert_eq!(start, 0, "heap region must start empty");

    self.set_word(0, 0);
    self.set_header(PROLOGUE, Header::new(DSIZE, true, true));
    self.set_word(PROLOGUE.offset(), Header::new(DSIZE, true, true).encode());
    self.set_header(FIRST_BLOCK, Header::new(chunk, false, true));
    self.set_footer(FIRST_BLOCK, chunk);
    self.set_header(FIRST_BLOCK.following(chunk), Header::new(0, true, false));
    self.push_free(FIRST_BLOCK);
    self.initialized = true;

    heap_log!(self, debug, "heap initialized at {:?} with {span} bytes", self.region.base());
    self.debug_check("init");
    Ok(())
  }

  /// Allocates a block with at least `size` usable bytes.
  ///
  /// Returns `Ok(None)` for a zero-size request. The payload is aligned to
  /// [`DSIZE`].
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    self.allocate_aligned(size, DSIZE)
  }

  /// Like [`allocate`](Self::allocate), with the payload address aligned to
  /// `align`, which must be a power of two.
  ///
  /// Alignments above [`DSIZE`] search for a block with room to spare and
  /// carve the misaligned front off as a free block of its own, so the
  /// result is released like any other block.
  pub fn allocate_aligned(
    &mut self,
    size: usize,
    align: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if !align.is_power_of_two() {
      return Err(HeapError::InvalidAlignment { align });
    }

    if size == 0 {
      return Ok(None);
    }

    self.init()?;

    let asize = adjusted_size(size).ok_or(HeapError::OutOfMemory { requested: size })?;
    let search = if align <= DSIZE {
      asize
    } else {
      align
        .checked_add(MIN_BLOCK_SIZE)
        .and_then(|slack| slack.checked_add(asize))
        .ok_or(HeapError::OutOfMemory { requested: size })?
    };

    let mut bp = match self.find_fit(search) {
      Some(bp) => bp,
      None => self.extend_for(search)?,
    };
    self.remove(bp);
    if align > DSIZE {
      bp = self.split_for_alignment(bp, align);
    }
    self.place(bp, asize);

    heap_log!(self, trace, "allocate({size}) -> block {:#x} ({} bytes)", bp.offset(), self.size_of(bp));
    self.debug_check("allocate");

    Ok(Some(self.payload_ptr(bp)))
  }

  /// Splits the unlinked free block `bp` so the second half starts on an
  /// `align` boundary. The front half, at least one minimum block, goes back
  /// on the free lists; the unlinked second half is returned.
  fn split_for_alignment(
    &mut self,
    bp: BlockRef,
    align: usize,
  ) -> BlockRef {
    let addr = self.region.base() as usize + bp.offset();
    if addr & (align - 1) == 0 {
      return bp;
    }

    let lead = align!(addr + MIN_BLOCK_SIZE, align) - addr;
    let header = self.header(bp);
    let rest = header.size - lead;

    self.set_header(bp, Header::new(lead, false, header.prev_allocated));
    self.set_footer(bp, lead);
    self.push_free(bp);

    let aligned = bp.following(lead);
    self.set_header(aligned, Header::new(rest, false, false));
    self.set_footer(aligned, rest);
    aligned
  }

  /// Returns the block behind `ptr` to the heap.
  ///
  /// Null pointers and pointers that do not name a live block of this heap
  /// are ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must be null, outside the region, or a pointer previously returned
  /// by this heap. An interior pointer into a live block may corrupt the heap.
  pub unsafe fn release(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(bp) = self.block_ref(ptr) else {
      if !ptr.is_null() {
        heap_log!(self, warn, "release({ptr:?}) ignored: not a live block of this heap");
      }
      return;
    };

    let header = self.header(bp);
    self.set_header(bp, Header::new(header.size, false, header.prev_allocated));
    self.set_footer(bp, header.size);
    self.set_prev_allocated(bp.following(header.size), false);

    self.push_free(bp);
    let merged = self.coalesce(bp);

    heap_log!(
      self,
      trace,
      "release(block {:#x}) -> free block {:#x} ({} bytes)",
      bp.offset(),
      merged.offset(),
      self.size_of(merged)
    );
    self.debug_check("release");
  }

  /// Moves the payload behind `ptr` into a fresh block of at least `size`
  /// bytes.
  ///
  /// A null `ptr` behaves as [`allocate`](Self::allocate); a zero `size`
  /// behaves as [`release`](Self::release) and returns `Ok(None)`. On failure
  /// the original block is left untouched.
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](Self::release).
  pub unsafe fn resize(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    unsafe { self.resize_aligned(ptr, size, DSIZE) }
  }

  /// [`resize`](Self::resize) into a block aligned like
  /// [`allocate_aligned`](Self::allocate_aligned).
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](Self::release).
  pub unsafe fn resize_aligned(
    &mut self,
    ptr: *mut u8,
    size: usize,
    align: usize,
  ) -> Result<Option<NonNull<u8>>> {
    if ptr.is_null() {
      return self.allocate_aligned(size, align);
    }

    if size == 0 {
      unsafe { self.release(ptr) };
      return Ok(None);
    }

    let old = self.block_ref(ptr).ok_or(HeapError::InvalidPointer)?;
    let old_payload = self.size_of(old) - WSIZE;

    let Some(new) = self.allocate_aligned(size, align)? else {
      return Ok(None);
    };

    unsafe {
      ptr::copy_nonoverlapping(ptr, new.as_ptr(), old_payload.min(size));
      self.release(ptr);
    }

    Ok(Some(new))
  }

  /// Allocates `count * size` bytes and zero-fills the whole payload.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let bytes = count
      .checked_mul(size)
      .ok_or(HeapError::OutOfMemory { requested: usize::MAX })?;

    let Some(ptr) = self.allocate(bytes)? else {
      return Ok(None);
    };

    if let Some(bp) = self.block_ref(ptr.as_ptr()) {
      let usable = self.size_of(bp) - WSIZE;
      unsafe { ptr::write_bytes(ptr.as_ptr(), 0, usable) };
    }

    Ok(Some(ptr))
  }

  /// Returns `true` when `ptr` lies inside the managed region.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    self.offset_of(ptr).is_some()
  }

  /// Usable payload bytes behind a live pointer.
  pub fn usable_size(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    self.block_ref(ptr).map(|bp| self.size_of(bp) - WSIZE)
  }

  /// Resolves `ptr` to the allocated block whose payload starts there.
  ///
  /// Returns `None` for null pointers, pointers outside the region, misaligned
  /// pointers and blocks that are not currently allocated.
  pub fn block_ref(
    &self,
    ptr: *const u8,
  ) -> Option<BlockRef> {
    let offset = self.offset_of(ptr)?;
    if offset < FIRST_BLOCK.offset() || !is_aligned(offset) {
      return None;
    }

    let bp = BlockRef::new(offset);
    let header = self.header(bp);
    let in_bounds = header.size >= MIN_BLOCK_SIZE
      && is_aligned(header.size)
      && offset + header.size <= self.region.len();

    (header.allocated && in_bounds).then_some(bp)
  }

  /// Real blocks in address order, sentinels excluded.
  pub fn blocks(&self) -> Blocks<'_, R> {
    Blocks {
      heap: self,
      cursor: self.initialized.then_some(FIRST_BLOCK),
    }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      heap_size: self.heap_size(),
      ..HeapStats::default()
    };

    for (_, view) in self.blocks() {
      if view.is_free() {
        stats.free_blocks += 1;
        stats.free_bytes += view.size();
      } else {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += view.size();
      }
    }

    stats
  }

  /// Decodes the block at `bp`.
  pub fn view(
    &self,
    bp: BlockRef,
  ) -> BlockView {
    let header = self.header(bp);
    if header.allocated {
      return BlockView::Allocated { header };
    }

    BlockView::Free {
      header,
      footer: Header::decode(self.word(bp.footer_offset(header.size))),
      links: self.links(bp),
    }
  }

  pub fn size_of(
    &self,
    bp: BlockRef,
  ) -> usize {
    block::size_of(self.word(bp.header_offset()))
  }

  pub fn is_allocated(
    &self,
    bp: BlockRef,
  ) -> bool {
    block::is_allocated(self.word(bp.header_offset()))
  }

  pub fn predecessor_allocated(
    &self,
    bp: BlockRef,
  ) -> bool {
    block::predecessor_allocated(self.word(bp.header_offset()))
  }

  pub(crate) fn word(
    &self,
    offset: usize,
  ) -> u32 {
    debug_assert!(offset + WSIZE <= self.region.len());
    unsafe { self.region.base().add(offset).cast::<u32>().read() }
  }

  pub(crate) fn set_word(
    &mut self,
    offset: usize,
    word: u32,
  ) {
    debug_assert!(offset + WSIZE <= self.region.len());
    unsafe { self.region.base().add(offset).cast::<u32>().write(word) }
  }

  pub(crate) fn header(
    &self,
    bp: BlockRef,
  ) -> Header {
    Header::decode(self.word(bp.header_offset()))
  }

  pub(crate) fn set_header(
    &mut self,
    bp: BlockRef,
    header: Header,
  ) {
    self.set_word(bp.header_offset(), header.encode());
  }

  pub(crate) fn set_footer(
    &mut self,
    bp: BlockRef,
    size: usize,
  ) {
    self.set_word(bp.footer_offset(size), block::encode_footer(size));
  }

  pub(crate) fn set_prev_allocated(
    &mut self,
    bp: BlockRef,
    prev_allocated: bool,
  ) {
    let header = self.header(bp);
    self.set_header(bp, Header { prev_allocated, ..header });
  }

  /// Block before `bp`, found through its footer. Only valid when that block
  /// is free.
  pub(crate) fn prev_block(
    &self,
    bp: BlockRef,
  ) -> BlockRef {
    let size = block::size_of(self.word(bp.offset() - DSIZE));
    BlockRef::new(bp.offset() - size)
  }

  /// The epilogue marker; its header is the last word of the region.
  pub(crate) fn epilogue(&self) -> BlockRef {
    BlockRef::new(self.region.len())
  }

  pub(crate) fn links(
    &self,
    bp: BlockRef,
  ) -> Links {
    Links {
      prev: BlockRef::decode_link(self.word(bp.offset())),
      next: BlockRef::decode_link(self.word(bp.offset() + WSIZE)),
    }
  }

  fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    if ptr.is_null() || !self.initialized {
      return None;
    }

    let base = self.region.base() as usize;
    let addr = ptr as usize;
    (addr >= base && addr < base + self.region.len()).then(|| addr - base)
  }

  fn payload_ptr(
    &self,
    bp: BlockRef,
  ) -> NonNull<u8> {
    // SAFETY: the heap is initialized, so the base is non-null and `bp` lies
    // inside the region.
    unsafe { NonNull::new_unchecked(self.region.base().add(bp.offset())) }
  }

  fn debug_check(
    &self,
    operation: &str,
  ) {
    if cfg!(feature = "heapdbg") {
      for violation in self.check_heap() {
        heap_log!(self, error, "{operation}: {violation}");
      }
    }
  }
}

/// Iterator over `(BlockRef, BlockView)` pairs, see [`Heap::blocks`].
pub struct Blocks<'a, R: Region> {
  heap: &'a Heap<R>,
  cursor: Option<BlockRef>,
}

impl<R: Region> Iterator for Blocks<'_, R> {
  type Item = (BlockRef, BlockView);

  fn next(&mut self) -> Option<Self::Item> {
    let bp = self.cursor?;
    let size = self.heap.size_of(bp);

    if size == 0 || bp.offset() + size > self.heap.region.len() {
      self.cursor = None;
      return None;
    }

    self.cursor = Some(bp.following(size));
    Some((bp, self.heap.view(bp)))
  }
}
