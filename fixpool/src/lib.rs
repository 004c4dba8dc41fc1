#![no_std]
#![deny(missing_docs)]

//! A fixed-chunk-size memory pool.
//!
//! The type `FixedAllocator` serves values of a single type out of page-aligned blocks of memory obtained directly
//! from the OS, recycling the chunks of released values, and returning blocks to the OS as soon as they are empty.
//!
//! #   Warning
//!
//! The allocator is single-threaded. It may be moved across threads, or shared behind a `Mutex`, but performs no
//! synchronization of its own.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod allocator;
mod platform;

pub use allocator::FixedAllocator;
pub use platform::OsPlatform;

pub use fixpool_core::{
    Configuration, ConfigurationError, Error, FixedPool, FreeNode, Platform, PowerOf2, DEFAULT_BLOCK_ALIGNMENT,
};
