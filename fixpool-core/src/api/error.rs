//! Errors reported by the pool.
//!
//! All errors are detected synchronously, and leave the pool untouched: there is no partial failure to recover from.

use thiserror::Error;

/// Reasons for which a `Configuration` is rejected when creating a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The block size is 0.
    #[error("block size must be non-zero")]
    BlockSizeZero,
    /// The chunks do not tile the block exactly.
    #[error("chunk size {chunk_size} must fit in the block size {block_size}")]
    BlockNotMultipleOfChunk {
        /// The configured block size.
        block_size: usize,
        /// The configured chunk size.
        chunk_size: usize,
    },
    /// A chunk cannot hold a pointer.
    #[error("chunk size {chunk_size} must be at least the size of a pointer ({minimum})")]
    ChunkSmallerThanPointer {
        /// The configured chunk size.
        chunk_size: usize,
        /// The size of a pointer.
        minimum: usize,
    },
    /// A chunk cannot hold an element.
    #[error("chunk size {chunk_size} must be at least the size of the element ({minimum})")]
    ChunkSmallerThanElement {
        /// The configured chunk size.
        chunk_size: usize,
        /// The size of the element.
        minimum: usize,
    },
    /// Chunks would not be suitably aligned for an element.
    #[error("chunk size {chunk_size} must be a multiple of the element alignment ({alignment})")]
    ChunkMisalignedForElement {
        /// The configured chunk size.
        chunk_size: usize,
        /// The alignment of the element.
        alignment: usize,
    },
    /// The element requires a greater alignment than blocks are guaranteed.
    #[error("element alignment {alignment} must not exceed the block alignment ({block_alignment})")]
    ElementOverAligned {
        /// The alignment of the element.
        alignment: usize,
        /// The resolved block alignment.
        block_alignment: usize,
    },
    /// The block size is not a multiple of the page size.
    #[error("block size {block_size} must be multiple of the block alignment ({alignment})")]
    BlockNotMultipleOfAlignment {
        /// The configured block size.
        block_size: usize,
        /// The resolved block alignment.
        alignment: usize,
    },
    /// A block would hold more chunks than can be indexed.
    #[error("block of {chunks} chunks exceeds the maximum of {maximum} chunks per block")]
    TooManyChunks {
        /// The number of chunks per block.
        chunks: usize,
        /// The maximum number of chunks per block.
        maximum: usize,
    },
}

/// Errors reported by the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// The pool could not be created.
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The address does not belong to any block of the pool.
    #[error("address {address:#x} does not belong to the pool")]
    OutOfRange {
        /// The offending address.
        address: usize,
    },
    /// The address belongs to a block of the pool, but does not point to the start of a chunk.
    #[error("address {address:#x} does not point to the start of a chunk")]
    Misaligned {
        /// The offending address.
        address: usize,
    },
    /// The chunk is already free.
    #[error("chunk at {address:#x} is already free")]
    DoubleRelease {
        /// The offending address.
        address: usize,
    },
    /// The platform could not provide a new block.
    #[error("could not allocate a block of {size} bytes aligned on {align}")]
    AllocationFailure {
        /// The size of the block.
        size: usize,
        /// The alignment of the block.
        align: usize,
    },
}
