//! Fixed Pool
//!
//! The pool serves values of a single type `T`, each in a chunk of a fixed size, out of a chain of blocks requested
//! from the Platform.
//!
//! -   Acquisition picks the first block of the chain with a free chunk, appending a new block if none has any.
//! -   Release returns the chunk to its block, and returns the block to the Platform if it is now empty, unless it is
//!     the last block of the pool.
//!
//! #   Safety
//!
//! The pool _assumes_ it is only used from a single thread at a time, and makes no attempt at synchronizing memory
//! accesses; all mutating operations require `&mut self` accordingly.

use alloc::vec::Vec;
use core::{
    alloc::Layout,
    fmt,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
};

use crate::{Configuration, Error, Platform};
use crate::api::configuration::BlockAlignment;
use crate::internals::{
    block::Block,
    block_chain::{BlockChain, BlockIndex},
};
use crate::utils;

/// A node of a free list: a free chunk, and the next free chunk, if any.
pub type FreeNode<T> = (NonNull<T>, Option<NonNull<T>>);

/// Fixed Pool.
///
/// Dropping the pool returns all its blocks to the Platform, without dropping the values they may still contain.
pub struct FixedPool<T, P>
    where
        P: Platform,
{
    platform: P,
    configuration: Configuration,
    alignment: BlockAlignment,
    blocks: BlockChain,
    _marker: PhantomData<T>,
}

impl<T, P> FixedPool<T, P>
    where
        P: Platform,
{
    /// Creates a pool, with its first block.
    ///
    /// Fails if the configuration is invalid for `T` and the alignment of the platform, or if the first block cannot
    /// be allocated.
    pub fn new(platform: P, configuration: Configuration) -> Result<Self, Error> {
        let alignment = BlockAlignment::resolve(&platform);

        configuration.validate::<T>(alignment.value())?;

        let anchor = Self::allocate_block(&platform, &configuration, alignment)?;
        let blocks = BlockChain::new(anchor);

        Ok(Self { platform, configuration, alignment, blocks, _marker: PhantomData })
    }

    /// Returns the platform.
    pub fn platform(&self) -> &P { &self.platform }

    /// Returns the configuration.
    pub fn configuration(&self) -> Configuration { self.configuration }

    /// Returns the size of a chunk, in bytes.
    pub fn chunk_size(&self) -> usize { self.configuration.chunk_size() }

    /// Returns the size of a block, in bytes.
    pub fn block_size(&self) -> usize { self.configuration.block_size() }

    /// Returns the alignment of blocks, in bytes.
    pub fn block_alignment(&self) -> usize { self.alignment.value().value() }

    /// Returns whether the platform could not report its page size, and the alignment of blocks was defaulted.
    pub fn was_block_alignment_defaulted(&self) -> bool { self.alignment.was_defaulted() }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> usize { self.blocks.len() }

    /// Moves `value` into a free chunk, and returns a pointer to it.
    ///
    /// Fails, dropping `value`, if a new block is required and cannot be allocated.
    pub fn acquire(&mut self, value: T) -> Result<NonNull<T>, Error> { self.acquire_with(move || value) }

    /// Constructs a value into a free chunk, and returns a pointer to it.
    ///
    /// The chunk is secured _before_ `constructor` is invoked; should `constructor` panic, the chunk is returned.
    ///
    /// Fails, without invoking `constructor`, if a new block is required and cannot be allocated.
    pub fn acquire_with<F>(&mut self, constructor: F) -> Result<NonNull<T>, Error>
        where
            F: FnOnce() -> T,
    {
        let (index, chunk) = self.available_chunk()?;

        let guard = ChunkGuard { pool: self, index, chunk };
        let value = constructor();
        mem::forget(guard);

        let chunk: NonNull<T> = chunk.cast();

        //  Safety:
        //  -   `chunk` is sufficiently sized and aligned for `T`, as validated by the configuration.
        //  -   `chunk` was just popped from the free list, hence is exclusively owned.
        unsafe { ptr::write(chunk.as_ptr(), value) };

        Ok(chunk)
    }

    /// Drops the value pointed to by `handle`, returns its chunk to the pool, and resets `handle` to `None`.
    ///
    /// Does nothing if `handle` is already `None`.
    ///
    /// If the chunk was the last in use of its block, and the block is not the last block of the pool, the block is
    /// returned to the platform.
    ///
    /// Fails, leaving both pool and `handle` untouched, if:
    ///
    /// -   The pointer does not belong to any block of the pool.
    /// -   The pointer does not point to the start of a chunk.
    /// -   The chunk is already free.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `handle` was returned by `acquire` or `acquire_with` on this pool.
    /// -   Assumes that `handle` has not been released since; the pool catches the case where the chunk is still free,
    ///     but not the case where it was acquired anew, or where its block was returned to the platform.
    /// -   Assumes that the value pointed to is no longer referenced.
    pub unsafe fn release(&mut self, handle: &mut Option<NonNull<T>>) -> Result<(), Error> {
        let pointer = match *handle {
            Some(pointer) => pointer,
            None => return Ok(()),
        };

        let address = pointer.as_ptr() as usize;
        let index = self.block_of(address)?;
        let slot = self.blocks.get(index).slot_of(address)?;

        if mem::needs_drop::<T>() {
            //  Safety:
            //  -   `pointer` points to a live `T`, as the chunk is in use.
            //  -   The value is no longer referenced, as per pre-condition.
            ptr::drop_in_place(pointer.as_ptr());
        }

        self.recycle(index, slot);

        *handle = None;

        Ok(())
    }

    /// Returns the number of free chunks of the block containing `pointer`.
    pub fn available_chunks_in_block(&self, pointer: *const T) -> Result<usize, Error> {
        self.block_containing(pointer).map(Block::available_chunks)
    }

    /// Returns the number of chunks in use of the block containing `pointer`.
    pub fn used_chunks_in_block(&self, pointer: *const T) -> Result<usize, Error> {
        self.block_containing(pointer).map(Block::used_chunks)
    }

    /// Returns the number of free bytes of the block containing `pointer`.
    pub fn available_space_in_block(&self, pointer: *const T) -> Result<usize, Error> {
        self.block_containing(pointer).map(Block::available_bytes)
    }

    /// Returns the number of bytes in use of the block containing `pointer`.
    pub fn used_space_in_block(&self, pointer: *const T) -> Result<usize, Error> {
        self.block_containing(pointer).map(Block::used_bytes)
    }

    /// Returns the start of the block containing `pointer`, or of the first block if `pointer` is null.
    pub fn block_address(&self, pointer: *const T) -> Result<NonNull<T>, Error> {
        let block = if pointer.is_null() {
            self.blocks.get(self.blocks.first())
        } else {
            self.block_containing(pointer)?
        };

        Ok(block.memory().cast())
    }

    /// Returns the free list of the block containing `pointer`, from its head.
    ///
    /// Each node is a free chunk paired with the next free chunk; the last node is paired with `None`. The list is
    /// empty if, and only if, all chunks of the block are in use.
    pub fn dump_free_list(&self, pointer: *const T) -> Result<Vec<FreeNode<T>>, Error> {
        let block = self.block_containing(pointer)?;

        let mut nodes = Vec::with_capacity(block.available_chunks());
        nodes.extend(block.free_list().map(|(chunk, next)| (chunk.cast(), next.map(NonNull::cast))));

        Ok(nodes)
    }

    //  Returns a free chunk, and the index of its block, appending a new block to the chain if necessary.
    fn available_chunk(&mut self) -> Result<(BlockIndex, NonNull<u8>), Error> {
        let index = match self.blocks.first_fit() {
            Some(index) => index,
            None => self.grow()?,
        };

        let chunk = self.blocks.get_mut(index).pop().expect("Free chunk in first-fit block");

        Ok((index, chunk))
    }

    //  Returns the chunk at `slot` to its block, returning the block to the platform if now empty, unless last.
    fn recycle(&mut self, index: BlockIndex, slot: u32) {
        let block = self.blocks.get_mut(index);
        block.push(slot);

        if block.is_empty() && self.blocks.len() > 1 {
            let block = self.blocks.unlink(index);

            //  Safety:
            //  -   `block.memory()` was allocated by `self.platform` with `self.layout()`.
            //  -   No chunk of `block` is in use.
            unsafe { self.platform.deallocate(block.memory(), self.layout()) };
        }
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self) -> Result<BlockIndex, Error> {
        let block = Self::allocate_block(&self.platform, &self.configuration, self.alignment)?;

        Ok(self.blocks.push_back(block))
    }

    fn block_of(&self, address: usize) -> Result<BlockIndex, Error> {
        self.blocks.find(address).ok_or(Error::OutOfRange { address })
    }

    fn block_containing(&self, pointer: *const T) -> Result<&Block, Error> {
        self.block_of(pointer as usize).map(|index| self.blocks.get(index))
    }

    fn layout(&self) -> Layout { Self::block_layout(&self.configuration, self.alignment) }

    fn block_layout(configuration: &Configuration, alignment: BlockAlignment) -> Layout {
        //  Safety:
        //  -   `alignment` is a power of 2.
        //  -   `block_size` is a non-zero multiple of `alignment`, as validated.
        unsafe { Layout::from_size_align_unchecked(configuration.block_size(), alignment.value().value()) }
    }

    fn allocate_block(platform: &P, configuration: &Configuration, alignment: BlockAlignment) -> Result<Block, Error> {
        let layout = Self::block_layout(configuration, alignment);

        //  Safety:
        //  -   `layout.size()` is a non-zero multiple of `layout.align()`.
        let memory = unsafe { platform.allocate(layout) }
            .ok_or(Error::AllocationFailure { size: layout.size(), align: layout.align() })?;

        debug_assert!(utils::is_sufficiently_aligned_for(memory, alignment.value()));

        //  Safety:
        //  -   `memory` points to `block_size` bytes, that is `chunks_per_block` chunks.
        //  -   `memory` is fresh, hence exclusively owned.
        Ok(unsafe { Block::new(memory, configuration.chunk_size(), configuration.chunks_per_block()) })
    }
}

impl<T, P> Drop for FixedPool<T, P>
    where
        P: Platform,
{
    fn drop(&mut self) {
        let layout = self.layout();

        for (_, block) in self.blocks.iter() {
            //  Safety:
            //  -   `block.memory()` was allocated by `self.platform` with `layout`.
            //  -   The pool is going away, hence its chunks can no longer be accessed.
            unsafe { self.platform.deallocate(block.memory(), layout) };
        }
    }
}

impl<T, P> fmt::Debug for FixedPool<T, P>
    where
        P: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("configuration", &self.configuration)
            .field("alignment", &self.alignment)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

//  Safety:
//  -   The pool exclusively owns its blocks, and the values of type `T` within.
unsafe impl<T, P> Send for FixedPool<T, P>
    where
        T: Send,
        P: Platform + Send,
{
}

//  Returns the chunk to the pool on drop; used to recover from a panicking constructor.
struct ChunkGuard<'a, T, P>
    where
        P: Platform,
{
    pool: &'a mut FixedPool<T, P>,
    index: BlockIndex,
    chunk: NonNull<u8>,
}

impl<'a, T, P> Drop for ChunkGuard<'a, T, P>
    where
        P: Platform,
{
    #[cold]
    fn drop(&mut self) {
        let slot = self.pool.blocks.get(self.index).slot_of(self.chunk.as_ptr() as usize);

        //  The chunk was popped by `acquire_with`, and nothing could release it since.
        debug_assert!(slot.is_ok(), "Guarded chunk {:?} not in use: {:?}", self.chunk, slot);

        if let Ok(slot) = slot {
            self.pool.recycle(self.index, slot);
        }
    }
}

#[cfg(test)]
impl<T, P> FixedPool<T, P>
    where
        P: Platform,
{
    fn check_invariants(&self) {
        let mut ranges: Vec<(usize, usize)> = self.blocks.iter()
            .map(|(_, block)| {
                block.check_invariants();
                (block.memory().as_ptr() as usize, block.end())
            })
            .collect();

        assert!(!ranges.is_empty());

        ranges.sort();

        for window in ranges.windows(2) {
            assert!(window[0].1 <= window[1].0, "Overlapping blocks: {:x?}", window);
        }
    }
}
