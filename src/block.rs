//! Block layout codec.
//!
//! ```text
//!   Allocated block:              Free block:
//!
//!   ┌──────────────┐ ← hdr        ┌──────────────┐ ← hdr
//!   │ size | p | 1 │              │ size | p | 0 │
//!   ├──────────────┤ ← bp         ├──────────────┤ ← bp
//!   │              │              │ prev link    │
//!   │   payload    │              │ next link    │
//!   │              │              │   (unused)   │
//!   │              │              ├──────────────┤ ← ftr
//!   │              │              │ size | 0 | 0 │
//!   └──────────────┘              └──────────────┘
//! ```
//!
//! Every header and footer is one 32-bit word. Bit 0 says "this block is
//! allocated", bit 1 says "the block right before this one is allocated".
//! Sizes are multiples of [`DSIZE`], so the low three bits are always free
//! for status.

/// Word size: one header, footer or free-list link.
pub const WSIZE: usize = 4;

/// Alignment unit. Block sizes and payload offsets are multiples of it.
pub const DSIZE: usize = 8;

/// Smallest block that can hold a header, two links and a footer.
pub const MIN_BLOCK_SIZE: usize = 2 * DSIZE;

const ALLOCATED: u32 = 0b001;
const PREV_ALLOCATED: u32 = 0b010;
const STATUS_MASK: u32 = 0b111;

/// Reference to a block: the byte offset of its payload from the region base.
///
/// Offset 0 is never a payload, so the raw value 0 doubles as "no block" when
/// links are written into free blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockRef(u32);

impl BlockRef {
  pub(crate) const fn new(offset: usize) -> Self {
    debug_assert!(offset != 0 && offset <= u32::MAX as usize);
    Self(offset as u32)
  }

  /// Payload offset from the region base.
  pub const fn offset(self) -> usize {
    self.0 as usize
  }

  pub(crate) const fn header_offset(self) -> usize {
    self.offset() - WSIZE
  }

  pub(crate) const fn footer_offset(
    self,
    size: usize,
  ) -> usize {
    self.offset() + size - DSIZE
  }

  /// The block that starts right after this one, given this block's size.
  pub(crate) const fn following(
    self,
    size: usize,
  ) -> Self {
    Self::new(self.offset() + size)
  }

  pub(crate) const fn encode_link(link: Option<Self>) -> u32 {
    match link {
      Some(block) => block.0,
      None => 0,
    }
  }

  pub(crate) const fn decode_link(word: u32) -> Option<Self> {
    if word == 0 { None } else { Some(Self(word)) }
  }
}

/// Decoded header word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
  pub size: usize,
  pub allocated: bool,
  pub prev_allocated: bool,
}

impl Header {
  pub const fn new(
    size: usize,
    allocated: bool,
    prev_allocated: bool,
  ) -> Self {
    Self {
      size,
      allocated,
      prev_allocated,
    }
  }

  pub const fn decode(word: u32) -> Self {
    Self {
      size: size_of(word),
      allocated: is_allocated(word),
      prev_allocated: predecessor_allocated(word),
    }
  }

  pub const fn encode(self) -> u32 {
    debug_assert!(self.size & STATUS_MASK as usize == 0);
    let mut word = self.size as u32;
    if self.allocated {
      word |= ALLOCATED;
    }
    if self.prev_allocated {
      word |= PREV_ALLOCATED;
    }
    word
  }
}

/// Footers only mirror the size. Their status bits are always clear.
pub const fn encode_footer(size: usize) -> u32 {
  debug_assert!(size & STATUS_MASK as usize == 0);
  size as u32
}

pub const fn size_of(word: u32) -> usize {
  (word & !STATUS_MASK) as usize
}

pub const fn is_allocated(word: u32) -> bool {
  word & ALLOCATED != 0
}

pub const fn predecessor_allocated(word: u32) -> bool {
  word & PREV_ALLOCATED != 0
}

/// Free-list links stored in the first two payload words of a free block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Links {
  pub prev: Option<BlockRef>,
  pub next: Option<BlockRef>,
}

/// Structured view of one block, as read from the heap.
///
/// Allocated blocks have nothing but a header; free blocks also carry
/// their footer and list links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockView {
  Allocated {
    header: Header,
  },
  Free {
    header: Header,
    footer: Header,
    links: Links,
  },
}

impl BlockView {
  pub fn header(&self) -> Header {
    match *self {
      BlockView::Allocated { header } | BlockView::Free { header, .. } => header,
    }
  }

  pub fn size(&self) -> usize {
    self.header().size
  }

  pub fn is_free(&self) -> bool {
    matches!(self, BlockView::Free { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_encoding() {
    let header = Header::new(48, true, false);
    assert_eq!(header.encode(), 48 | 1);

    let header = Header::new(48, false, true);
    assert_eq!(header.encode(), 48 | 2);

    let header = Header::new(0, true, true);
    assert_eq!(header.encode(), 3);
  }

  #[test]
  fn test_header_decoding_masks_status_bits() {
    let word = Header::new(4096, true, true).encode();
    assert_eq!(size_of(word), 4096);
    assert!(is_allocated(word));
    assert!(predecessor_allocated(word));
    assert_eq!(Header::decode(word), Header::new(4096, true, true));
  }

  #[test]
  fn test_footer_has_no_status() {
    let footer = encode_footer(464);
    assert_eq!(footer, 464);
    assert!(!is_allocated(footer));
    assert_eq!(Header::decode(footer).size, 464);
  }

  #[test]
  fn test_links() {
    assert_eq!(BlockRef::encode_link(None), 0);
    assert_eq!(BlockRef::decode_link(0), None);

    let block = BlockRef::new(72);
    assert_eq!(BlockRef::decode_link(BlockRef::encode_link(Some(block))), Some(block));
    assert_eq!(block.header_offset(), 68);
    assert_eq!(block.footer_offset(32), 96);
    assert_eq!(block.following(32).offset(), 104);
  }

  #[test]
  fn test_view_accessors() {
    let view = BlockView::Free {
      header: Header::new(32, false, true),
      footer: Header::new(32, false, false),
      links: Links::default(),
    };
    assert!(view.is_free());
    assert_eq!(view.size(), 32);

    let view = BlockView::Allocated {
      header: Header::new(16, true, true),
    };
    assert!(!view.is_free());
    assert_eq!(view.size(), 16);
  }
}
