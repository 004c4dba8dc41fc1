//! Platform
//!
//! The Platform trait is used to request blocks of memory directly from the Platform. By abstracting the underlying
//! platform, it becomes possible to easily port the code to a different OS, or to run the pool against an
//! instrumented platform in tests.

use core::{
    alloc::Layout,
    ptr::NonNull,
};

use crate::PowerOf2;

/// Abstraction of platform specific memory allocation and deallocation.
pub trait Platform {
    /// Returns the size of a memory page, if the platform can tell.
    ///
    /// The pool aligns each of its blocks on a page boundary; when `None` is returned it falls back to
    /// `DEFAULT_BLOCK_ALIGNMENT`, and records the fact.
    fn page_size(&self) -> Option<PowerOf2>;

    /// Allocates a fresh block of memory as per the specified layout.
    ///
    /// Returns `None` if the allocation request cannot be satisfied.
    ///
    /// #   Safety
    ///
    /// The caller may assume that if the returned pointer is not null then:
    /// -   The number of usable bytes is _greater than or equal_ to `layout.size()`.
    /// -   The pointer is _at least_ aligned to `layout.align()`.
    ///
    /// `allocate` assumes that:
    /// -   `layout.size()` is a non-zero multiple of `layout.align()`.
    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Deallocates the supplied block of memory.
    ///
    /// #   Safety
    ///
    /// The caller should no longer reference the memory after calling this function.
    ///
    /// `deallocate` assumes that:
    /// -   `pointer` was allocated by this instance of `Platform`, with `layout` as argument.
    /// -   `pointer` is the value returned by `Platform`, and not an interior pointer.
    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout);
}

impl<P> Platform for &P
    where
        P: Platform + ?Sized
{
    fn page_size(&self) -> Option<PowerOf2> { (**self).page_size() }

    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> { (**self).allocate(layout) }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) { (**self).deallocate(pointer, layout) }
}
