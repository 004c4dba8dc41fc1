//! The configuration of a pool.
//!
//! A pool is configured by two sizes:
//!
//! -   The chunk size: the number of bytes reserved for each value served by the pool.
//! -   The block size: the number of bytes requested from the Platform at once, carved into chunks.
//!
//! Both are fixed for the lifetime of the pool, and validated when it is created, against the served type and the
//! alignment of the blocks.

use core::mem;

use crate::{ConfigurationError, Platform, PowerOf2};
use crate::internals::block::MAXIMUM_CHUNKS;

/// The alignment of blocks, when the platform cannot report its page size.
//  Safety:
//  -   4096 is a power of 2.
pub const DEFAULT_BLOCK_ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(4096) };

/// Configuration
///
/// The pairing of a chunk size and a block size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Configuration {
    chunk_size: usize,
    block_size: usize,
}

impl Configuration {
    /// Creates an instance.
    ///
    /// The instance is only validated when creating a pool.
    pub const fn new(chunk_size: usize, block_size: usize) -> Self { Self { chunk_size, block_size } }

    /// Creates an instance with the smallest chunk size suitable for `T`.
    ///
    /// The chunk size is the size of `T`, or of a pointer if larger, rounded up to the alignment of `T`.
    pub fn for_type<T>(block_size: usize) -> Self {
        let size = mem::size_of::<T>().max(mem::size_of::<*const u8>());
        let chunk_size = PowerOf2::align_of::<T>().round_up(size);

        Self::new(chunk_size, block_size)
    }

    /// Returns the size of a chunk, in bytes.
    pub const fn chunk_size(&self) -> usize { self.chunk_size }

    /// Returns the size of a block, in bytes.
    pub const fn block_size(&self) -> usize { self.block_size }

    /// Returns the number of chunks in a block.
    ///
    /// #   Panics
    ///
    /// If the chunk size is 0.
    pub const fn chunks_per_block(&self) -> usize { self.block_size / self.chunk_size }

    /// Checks whether this configuration can serve values of type `T` out of blocks aligned on `alignment`.
    pub fn validate<T>(&self, alignment: PowerOf2) -> Result<(), ConfigurationError> {
        let (chunk_size, block_size) = (self.chunk_size, self.block_size);

        if block_size == 0 {
            return Err(ConfigurationError::BlockSizeZero);
        }

        let minimum = mem::size_of::<*const u8>();

        if chunk_size == 0 {
            return Err(ConfigurationError::ChunkSmallerThanPointer { chunk_size, minimum });
        }

        if block_size % chunk_size != 0 {
            return Err(ConfigurationError::BlockNotMultipleOfChunk { block_size, chunk_size });
        }

        if chunk_size < minimum {
            return Err(ConfigurationError::ChunkSmallerThanPointer { chunk_size, minimum });
        }

        if chunk_size < mem::size_of::<T>() {
            return Err(ConfigurationError::ChunkSmallerThanElement { chunk_size, minimum: mem::size_of::<T>() });
        }

        let element_alignment = PowerOf2::align_of::<T>();

        if chunk_size % element_alignment != 0 {
            return Err(ConfigurationError::ChunkMisalignedForElement {
                chunk_size,
                alignment: element_alignment.value(),
            });
        }

        if element_alignment > alignment {
            return Err(ConfigurationError::ElementOverAligned {
                alignment: element_alignment.value(),
                block_alignment: alignment.value(),
            });
        }

        if block_size % alignment != 0 {
            return Err(ConfigurationError::BlockNotMultipleOfAlignment { block_size, alignment: alignment.value() });
        }

        let chunks = self.chunks_per_block();

        if chunks > MAXIMUM_CHUNKS {
            return Err(ConfigurationError::TooManyChunks { chunks, maximum: MAXIMUM_CHUNKS });
        }

        Ok(())
    }
}

/// The alignment of the blocks of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockAlignment {
    value: PowerOf2,
    defaulted: bool,
}

impl BlockAlignment {
    /// Resolves the alignment from the page size reported by the platform.
    pub(crate) fn resolve<P>(platform: &P) -> Self
        where
            P: Platform,
    {
        match platform.page_size() {
            Some(value) => Self { value, defaulted: false },
            None => Self { value: DEFAULT_BLOCK_ALIGNMENT, defaulted: true },
        }
    }

    /// Returns the alignment.
    pub(crate) fn value(&self) -> PowerOf2 { self.value }

    /// Returns whether the platform could not report its page size.
    pub(crate) fn was_defaulted(&self) -> bool { self.defaulted }
}
