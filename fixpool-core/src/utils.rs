//! A collection of utilities.

use core::ptr::NonNull;

mod power_of_2;

pub use power_of_2::PowerOf2;

/// Returns whether the pointer is sufficiently aligned for the given alignment.
pub(crate) fn is_sufficiently_aligned_for(ptr: NonNull<u8>, alignment: PowerOf2) -> bool {
    (ptr.as_ptr() as usize) % alignment == 0
}
