//! Implementation of Linux specific calls.

use core::{alloc::Layout, ptr};

use fixpool_core::{Platform, PowerOf2};
use tracing::{debug, warn};

/// Implementation of the Platform trait, for Linux.
///
/// Blocks are mapped directly with `mmap`, and unmapped as soon as they are returned.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsPlatform;

impl OsPlatform {
    /// Creates an instance.
    pub const fn new() -> Self { Self }
}

impl Platform for OsPlatform {
    #[cold]
    fn page_size(&self) -> Option<PowerOf2> {
        //  Safety:
        //  -   `sysconf` has no pre-condition.
        let result = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

        let page_size = if result > 0 { PowerOf2::new(result as usize) } else { None };

        if page_size.is_none() {
            warn!(result, "could not determine the page size");
        }

        page_size
    }

    unsafe fn allocate(&self, layout: Layout) -> Option<ptr::NonNull<u8>> {
        //  Safety:
        //  -   `layout.align()` is a power of 2.
        let alignment = PowerOf2::new_unchecked(layout.align());

        debug_assert!(layout.size() % alignment == 0,
            "Incorrect size: {} % {} != 0", layout.size(), alignment.value());

        let candidate = mmap_exact(layout.size(), alignment)
            .or_else(|| mmap_over(layout.size(), alignment));

        match candidate {
            Some(pointer) => {
                debug_assert!(pointer.as_ptr() as usize % alignment == 0,
                    "Incorrect alignment of allocation: {:x} % {:x} != 0", pointer.as_ptr() as usize, alignment.value());

                debug!(address = pointer.as_ptr() as usize, size = layout.size(), align = layout.align(), "mapped block");
            },
            None => warn!(size = layout.size(), align = layout.align(), "could not map block"),
        }

        candidate
    }

    unsafe fn deallocate(&self, pointer: ptr::NonNull<u8>, layout: Layout) {
        debug!(address = pointer.as_ptr() as usize, size = layout.size(), "unmapping block");

        munmap_deallocate(pointer.as_ptr(), layout.size());
    }
}

//  Attempts to map the required size, relying on `mmap` page alignment to meet `alignment`.
//
//  If non-null, the result is aligned on `alignment`.
fn mmap_exact(size: usize, alignment: PowerOf2) -> Option<ptr::NonNull<u8>> {
    mmap_allocate(size)
        .and_then(|pointer| unsafe { mmap_check(pointer, size, alignment) })
}

//  Attempts to map the required size, for alignments greater than the page size.
//
//  Ensures the alignment is met by over-allocating then trimming front and back.
fn mmap_over(size: usize, alignment: PowerOf2) -> Option<ptr::NonNull<u8>> {
    let over_size = size.checked_add(alignment.value())?;
    let front_pointer = mmap_allocate(over_size)?;

    let misalignment = (front_pointer.as_ptr() as usize) % alignment;
    let front_size = if misalignment == 0 { 0 } else { alignment.value() - misalignment };
    let back_size = over_size - size - front_size;

    debug_assert!(front_size < alignment.value(), "{} >= {}", front_size, alignment.value());
    debug_assert!(back_size <= alignment.value(), "{} > {}", back_size, alignment.value());

    //  Safety:
    //  -   `front_size` is less than `over_size`, hence the result is within the mapped area.
    let aligned_pointer = unsafe { front_pointer.as_ptr().add(front_size) };

    debug_assert!(aligned_pointer as usize % alignment == 0,
        "{:x} not {:x}-aligned!", aligned_pointer as usize, alignment.value());

    //  Safety:
    //  -   `front_size + size` is at most `over_size`, hence the result is within the mapped area, or at its end.
    let back_pointer = unsafe { aligned_pointer.add(size) };

    if front_size > 0 {
        //  Safety:
        //  -   `front_pointer` points to a mapped area of at least `front_size` bytes.
        //  -   `[front_pointer, front_pointer + front_size)` is not in use.
        unsafe { munmap_deallocate(front_pointer.as_ptr(), front_size) };
    }

    if back_size > 0 {
        //  Safety:
        //  -   `back_pointer` points to a mapped area of at least `back_size` bytes.
        //  -   `[back_pointer, back_pointer + back_size)` is not in use.
        unsafe { munmap_deallocate(back_pointer, back_size) };
    }

    //  Safety:
    //  -   `aligned_pointer` is not null.
    Some(unsafe { ptr::NonNull::new_unchecked(aligned_pointer) })
}

//  `mmap` alignment checker.
//
//  Returns a non-null pointer if suitably aligned, and None otherwise.
//  If none is returned, the memory has been unmapped.
//
//  #   Safety
//
//  -   Assumes that `pointer` points to a mapped area of at least `size` bytes.
//  -   Assumes that `pointer` is not in use, unless returned.
unsafe fn mmap_check(pointer: ptr::NonNull<u8>, size: usize, alignment: PowerOf2) -> Option<ptr::NonNull<u8>> {
    if pointer.as_ptr() as usize % alignment == 0 {
        Some(pointer)
    } else {
        munmap_deallocate(pointer.as_ptr(), size);
        None
    }
}

//  Wrapper around `mmap`.
//
//  Returns a pointer to `size` zeroed bytes of memory, aligned on a page boundary.
fn mmap_allocate(size: usize) -> Option<ptr::NonNull<u8>> {
    let length = size;
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    //  No specific address hint.
    let addr = ptr::null_mut();
    //  When used in conjunction with MAP_ANONYMOUS, fd is mandated to be -1 on some implementations.
    let fd = -1;
    //  When used in conjunction with MAP_ANONYMOUS, offset is mandated to be 0 on some implementations.
    let offset = 0;

    //  Safety:
    //  -   `addr`, `fd`, and `offset` are suitable for MAP_ANONYMOUS.
    let result = unsafe { libc::mmap(addr, length, prot, flags, fd, offset) };

    let result = if result != libc::MAP_FAILED { result as *mut u8 } else { ptr::null_mut() };
    ptr::NonNull::new(result)
}

//  Wrapper around `munmap`.
//
//  #   Panics
//
//  If `munmap` returns a non-0 result.
//
//  #   Safety
//
//  -   Assumes that `addr` points to a mapped area of at least `size` bytes.
//  -   Assumes that the range `[addr, addr + size)` is no longer in use.
unsafe fn munmap_deallocate(addr: *mut u8, size: usize) {
    let result = libc::munmap(addr as *mut libc::c_void, size);
    assert!(result == 0, "Could not munmap {:x}, {}: {}", addr as usize, size, result);
}
