#![no_std]

#![deny(missing_docs)]

//! Building blocks for a fixed-chunk-size memory pool.
//!
//! fixpool-core serves values of a single type `T` out of large, page-aligned blocks of memory, carved into
//! equal-size chunks. It contains:
//! -   A platform trait, used to obtain the raw, aligned blocks of memory to be carved up.
//! -   A validated configuration, pairing the size of a chunk with the size of a block.
//! -   The pool itself, growing its chain of blocks on demand and eagerly returning empty blocks to the platform.
//!
//! The pool is single-threaded: it performs no synchronization whatsoever, and it is up to the user to serialize
//! access to it.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod api;
mod internals;
mod utils;

pub use api::*;
pub use utils::PowerOf2;
