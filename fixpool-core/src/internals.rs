//! The internals of fixpool-core.
//!
//! The internals provide all the heavy-lifting.

pub(crate) mod block;
pub(crate) mod block_chain;
