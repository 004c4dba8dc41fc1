//! Allocator

use core::ptr::NonNull;

use fixpool_core::{Configuration, Error, FixedPool, Platform};
use tracing::debug;

use crate::OsPlatform;

/// Fixed Allocator.
///
/// Serves values of type `T`, each in a chunk of a fixed size, out of blocks obtained from the platform `P`.
///
/// The allocator owns its pool; dropping the allocator returns all blocks to the platform, without dropping the values
/// still allocated.
pub struct FixedAllocator<T, P = OsPlatform>
    where
        P: Platform,
{
    pool: FixedPool<T, P>,
}

impl<T> FixedAllocator<T> {
    /// Creates an instance, backed by the OS.
    ///
    /// Fails if the configuration is invalid for `T` and the page size of the OS, or if the first block cannot be
    /// obtained.
    pub fn new(chunk_size: usize, block_size: usize) -> Result<Self, Error> {
        Self::with_platform(OsPlatform::new(), Configuration::new(chunk_size, block_size))
    }

    /// Creates an instance, backed by the OS, with the smallest chunk size suitable for `T`.
    pub fn for_type(block_size: usize) -> Result<Self, Error> {
        Self::with_platform(OsPlatform::new(), Configuration::for_type::<T>(block_size))
    }
}

impl<T, P> FixedAllocator<T, P>
    where
        P: Platform,
{
    /// Creates an instance, backed by `platform`.
    #[cold]
    pub fn with_platform(platform: P, configuration: Configuration) -> Result<Self, Error> {
        let pool = FixedPool::new(platform, configuration)?;

        debug!(
            chunk_size = pool.chunk_size(),
            block_size = pool.block_size(),
            block_alignment = pool.block_alignment(),
            defaulted = pool.was_block_alignment_defaulted(),
            "created fixed allocator"
        );

        Ok(Self { pool })
    }

    /// Moves `value` into a chunk, and returns a pointer to it.
    ///
    /// Fails, dropping `value`, if no block has a free chunk and no further block can be obtained.
    pub fn allocate(&mut self, value: T) -> Result<NonNull<T>, Error> { self.pool.acquire(value) }

    /// Constructs a value into a chunk, and returns a pointer to it.
    ///
    /// Fails, without invoking `constructor`, if no block has a free chunk and no further block can be obtained.
    pub fn allocate_with<F>(&mut self, constructor: F) -> Result<NonNull<T>, Error>
        where
            F: FnOnce() -> T,
    {
        self.pool.acquire_with(constructor)
    }

    /// Drops the value pointed to by `handle`, returns its chunk, and resets `handle` to `None`.
    ///
    /// Does nothing if `handle` is `None`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `handle` has been returned by a prior call to `allocate` or `allocate_with` on this instance.
    /// -   Assumes `handle` has not been deallocated since its allocation.
    /// -   Assumes the value pointed to by `handle` is no longer in use.
    pub unsafe fn deallocate(&mut self, handle: &mut Option<NonNull<T>>) -> Result<(), Error> {
        self.pool.release(handle)
    }

    /// Returns the size of a chunk, in bytes.
    pub fn chunk_size(&self) -> usize { self.pool.chunk_size() }

    /// Returns the underlying pool, for introspection.
    pub fn pool(&self) -> &FixedPool<T, P> { &self.pool }
}

impl<T, P> core::fmt::Debug for FixedAllocator<T, P>
    where
        P: Platform,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FixedAllocator").field("pool", &self.pool).finish()
    }
}
