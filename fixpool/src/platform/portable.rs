//! Implementation of the Platform on top of the global allocator, for targets without a dedicated implementation.

use alloc::alloc::{alloc_zeroed, dealloc};
use core::{alloc::Layout, ptr::NonNull};

use fixpool_core::{Platform, PowerOf2};
use tracing::{debug, warn};

/// Implementation of the Platform trait, on top of the global allocator.
///
/// The page size is not known, hence pools fall back to the default block alignment.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsPlatform;

impl OsPlatform {
    /// Creates an instance.
    pub const fn new() -> Self { Self }
}

impl Platform for OsPlatform {
    #[cold]
    fn page_size(&self) -> Option<PowerOf2> {
        warn!("page size unavailable on this target");
        None
    }

    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        //  Safety:
        //  -   `layout.size()` is non-zero.
        let pointer = NonNull::new(alloc_zeroed(layout));

        match pointer {
            Some(pointer) => debug!(address = pointer.as_ptr() as usize, size = layout.size(), "allocated block"),
            None => warn!(size = layout.size(), align = layout.align(), "could not allocate block"),
        }

        pointer
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) {
        debug!(address = pointer.as_ptr() as usize, size = layout.size(), "deallocating block");

        dealloc(pointer.as_ptr(), layout);
    }
}
