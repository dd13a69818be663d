/// Rounds `value` up to the next multiple of the heap alignment unit
/// ([`DSIZE`](crate::block::DSIZE), 8 bytes), or of an explicit power-of-two
/// `unit` when one is given.
///
/// # Examples
///
/// ```rust
/// use segalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(5, 4), 8);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align!($value, $crate::block::DSIZE)
  };
  ($value:expr, $unit:expr) => {
    (($value) + ($unit) - 1) & !(($unit) - 1)
  };
}

/// Returns `true` when `value` is a multiple of the heap alignment unit.
#[inline]
pub const fn is_aligned(value: usize) -> bool {
  value & (crate::block::DSIZE - 1) == 0
}
