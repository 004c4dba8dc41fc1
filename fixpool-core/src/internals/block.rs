//! Block
//!
//! A Block is a contiguous region of memory carved into equal-size chunks.
//!
//! Whilst a chunk is in use, its content is purely in the hands of the user. The book-keeping of the free chunks is
//! therefore kept on the side, in a table with one link per chunk:
//!
//! -   A free chunk links to the next free chunk, or to the end of the list.
//! -   A chunk in use is tagged as such, which allows catching a chunk being released twice.
//!
//! The free chunks form a tail-list, used as a LIFO stack: the last released chunk is the first to be reused.

use alloc::boxed::Box;
use core::{
    fmt,
    ptr::{self, NonNull},
};

use crate::Error;
use crate::internals::block_chain::BlockIndex;

/// Index of a chunk within its block.
pub(crate) type SlotIndex = u32;

//  Link of a chunk in use.
const IN_USE: SlotIndex = SlotIndex::MAX;

//  Link of the last free chunk.
const END: SlotIndex = SlotIndex::MAX - 1;

/// Maximum number of chunks in a block, so that no chunk index collides with the sentinels.
pub(crate) const MAXIMUM_CHUNKS: usize = END as usize;

/// Block.
pub(crate) struct Block {
    //  Start of the memory area, `capacity * chunk_size` bytes.
    memory: NonNull<u8>,
    chunk_size: usize,
    //  One link per chunk.
    links: Box<[SlotIndex]>,
    //  First free chunk, if any.
    head: Option<SlotIndex>,
    used: usize,
    available: usize,
    //  Siblings in the chain, maintained by `BlockChain`.
    pub(crate) prev: Option<BlockIndex>,
    pub(crate) next: Option<BlockIndex>,
}

impl Block {
    /// Creates a `Block` over the memory area at `memory`, with all its chunks free.
    ///
    /// The memory area is zeroed, and the free list threads through the chunks in address order.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `memory` points to at least `chunk_size * capacity` bytes.
    /// -   Assumes that access to the memory area is exclusive, for the lifetime of the block.
    pub(crate) unsafe fn new(memory: NonNull<u8>, chunk_size: usize, capacity: usize) -> Self {
        debug_assert!(chunk_size > 0);
        debug_assert!(capacity > 0 && capacity <= MAXIMUM_CHUNKS, "capacity: {}", capacity);

        //  Safety:
        //  -   `memory` is assumed to point to at least `chunk_size * capacity` bytes, exclusively.
        ptr::write_bytes(memory.as_ptr(), 0, chunk_size * capacity);

        let links = (1..=capacity)
            .map(|next| if next == capacity { END } else { next as SlotIndex })
            .collect();

        Self { memory, chunk_size, links, head: Some(0), used: 0, available: capacity, prev: None, next: None }
    }

    /// Returns the start of the memory area.
    pub(crate) fn memory(&self) -> NonNull<u8> { self.memory }

    /// Returns the first address past the end of the memory area.
    pub(crate) fn end(&self) -> usize { self.start() + self.chunk_size * self.capacity() }

    /// Returns whether `address` lies within `[start, end)`.
    pub(crate) fn contains(&self, address: usize) -> bool { self.start() <= address && address < self.end() }

    /// Returns the total number of chunks.
    pub(crate) fn capacity(&self) -> usize { self.links.len() }

    /// Returns the number of chunks in use.
    pub(crate) fn used_chunks(&self) -> usize { self.used }

    /// Returns the number of free chunks.
    pub(crate) fn available_chunks(&self) -> usize { self.available }

    /// Returns the number of bytes in use.
    pub(crate) fn used_bytes(&self) -> usize { self.used * self.chunk_size }

    /// Returns the number of free bytes.
    pub(crate) fn available_bytes(&self) -> usize { self.available * self.chunk_size }

    /// Returns whether no chunk is in use.
    pub(crate) fn is_empty(&self) -> bool { self.used == 0 }

    /// Pops the head of the free list, if any, and marks it in use.
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let slot = self.head?;

        let next = self.links[slot as usize];
        debug_assert!(next != IN_USE, "Free chunk {} tagged in use", slot);

        self.head = Self::decode(next);
        self.links[slot as usize] = IN_USE;

        self.used += 1;
        self.available -= 1;

        Some(self.chunk(slot))
    }

    /// Locates the chunk in use starting at `address`.
    ///
    /// Fails if `address` is not the start of a chunk, or the chunk is already free.
    pub(crate) fn slot_of(&self, address: usize) -> Result<SlotIndex, Error> {
        debug_assert!(self.contains(address));

        let offset = address - self.start();

        if offset % self.chunk_size != 0 {
            return Err(Error::Misaligned { address });
        }

        let slot = (offset / self.chunk_size) as SlotIndex;

        if self.links[slot as usize] != IN_USE {
            return Err(Error::DoubleRelease { address });
        }

        Ok(slot)
    }

    /// Pushes the chunk at `slot` at the head of the free list.
    ///
    /// `slot` is expected to be obtained from `slot_of`.
    pub(crate) fn push(&mut self, slot: SlotIndex) {
        debug_assert!(self.links[slot as usize] == IN_USE, "Chunk {} pushed twice", slot);
        debug_assert!(self.used > 0);

        self.links[slot as usize] = self.head.unwrap_or(END);
        self.head = Some(slot);

        self.used -= 1;
        self.available += 1;
    }

    /// Returns an iterator over the free list, from its head.
    pub(crate) fn free_list(&self) -> FreeList<'_> { FreeList { block: self, cursor: self.head } }

    fn start(&self) -> usize { self.memory.as_ptr() as usize }

    fn chunk(&self, slot: SlotIndex) -> NonNull<u8> {
        debug_assert!((slot as usize) < self.capacity());

        //  Safety:
        //  -   `slot` is within bounds, hence the result is within the memory area, and not null.
        unsafe { NonNull::new_unchecked(self.memory.as_ptr().add(slot as usize * self.chunk_size)) }
    }

    fn decode(link: SlotIndex) -> Option<SlotIndex> { if link == END { None } else { Some(link) } }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("memory", &self.memory)
            .field("chunk_size", &self.chunk_size)
            .field("used", &self.used)
            .field("available", &self.available)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .finish()
    }
}

/// Iterator over the free list of a block.
///
/// Yields each free chunk along with the next free chunk, if any.
pub(crate) struct FreeList<'a> {
    block: &'a Block,
    cursor: Option<SlotIndex>,
}

impl<'a> Iterator for FreeList<'a> {
    type Item = (NonNull<u8>, Option<NonNull<u8>>);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let next = Block::decode(self.block.links[slot as usize]);

        self.cursor = next;

        Some((self.block.chunk(slot), next.map(|next| self.block.chunk(next))))
    }
}

#[cfg(test)]
impl Block {
    /// Checks the accounting and free list invariants, panicking on violation.
    pub(crate) fn check_invariants(&self) {
        use std::collections::BTreeSet;

        assert_eq!(self.capacity(), self.used + self.available, "{:?}", self);
        assert_eq!(self.capacity() * self.chunk_size, self.used_bytes() + self.available_bytes(), "{:?}", self);
        assert_eq!(self.head.is_none(), self.available == 0, "{:?}", self);

        let mut seen = BTreeSet::new();

        for (chunk, _) in self.free_list() {
            let address = chunk.as_ptr() as usize;

            assert!(self.contains(address), "{:x} not in {:?}", address, self);
            assert!(seen.insert(address), "{:x} appears twice in the free list of {:?}", address, self);
        }

        assert_eq!(self.available, seen.len(), "{:?}", self);

        let in_use = self.links.iter().filter(|link| **link == IN_USE).count();
        assert_eq!(self.used, in_use, "{:?}", self);
    }
}
