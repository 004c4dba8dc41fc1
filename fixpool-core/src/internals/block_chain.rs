//! Block Chain
//!
//! The doubly-linked chain of blocks of a pool.
//!
//! The blocks are stored in an arena, and linked by index: a block never moves from its slot of the arena while it is
//! part of the chain, and the slots of unlinked blocks are recycled for later blocks. The order of the chain is the
//! order in which blocks were appended, and is never altered otherwise.

use alloc::vec::Vec;

use crate::internals::block::Block;

/// Index of a block within the arena of its chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BlockIndex(usize);

/// BlockChain.
///
/// Never empty: it is created with an anchor block, and refuses to unlink its last block.
pub(crate) struct BlockChain {
    slots: Vec<Option<Block>>,
    vacant: Vec<BlockIndex>,
    first: BlockIndex,
    last: BlockIndex,
    length: usize,
}

impl BlockChain {
    /// Creates a chain containing a single block.
    pub(crate) fn new(mut anchor: Block) -> Self {
        anchor.prev = None;
        anchor.next = None;

        let mut slots = Vec::with_capacity(4);
        slots.push(Some(anchor));

        Self { slots, vacant: Vec::new(), first: BlockIndex(0), last: BlockIndex(0), length: 1 }
    }

    /// Returns the number of blocks in the chain.
    pub(crate) fn len(&self) -> usize { self.length }

    /// Returns the index of the first block.
    pub(crate) fn first(&self) -> BlockIndex { self.first }

    /// Returns the block at `index`.
    ///
    /// #   Panics
    ///
    /// If `index` does not refer to a block of the chain.
    pub(crate) fn get(&self, index: BlockIndex) -> &Block {
        self.slots[index.0].as_ref().expect("Linked block")
    }

    /// Returns the block at `index`.
    ///
    /// #   Panics
    ///
    /// If `index` does not refer to a block of the chain.
    pub(crate) fn get_mut(&mut self, index: BlockIndex) -> &mut Block {
        self.slots[index.0].as_mut().expect("Linked block")
    }

    /// Returns an iterator over the blocks, in chain order.
    pub(crate) fn iter(&self) -> Iter<'_> { Iter { chain: self, cursor: Some(self.first) } }

    /// Returns the first block, in chain order, containing `address`.
    pub(crate) fn find(&self, address: usize) -> Option<BlockIndex> {
        self.iter()
            .find(|(_, block)| block.contains(address))
            .map(|(index, _)| index)
    }

    /// Returns the first block, in chain order, with at least one free chunk.
    pub(crate) fn first_fit(&self) -> Option<BlockIndex> {
        self.iter()
            .find(|(_, block)| block.available_chunks() > 0)
            .map(|(index, _)| index)
    }

    /// Appends `block` after the last block.
    pub(crate) fn push_back(&mut self, mut block: Block) -> BlockIndex {
        block.prev = Some(self.last);
        block.next = None;

        let index = match self.vacant.pop() {
            Some(index) => {
                debug_assert!(self.slots[index.0].is_none());

                self.slots[index.0] = Some(block);
                index
            },
            None => {
                self.slots.push(Some(block));
                BlockIndex(self.slots.len() - 1)
            },
        };

        self.get_mut(self.last).next = Some(index);
        self.last = index;
        self.length += 1;

        index
    }

    /// Unlinks the block at `index`, and returns it.
    ///
    /// #   Panics
    ///
    /// If `index` refers to the only block of the chain, or does not refer to a block of the chain.
    pub(crate) fn unlink(&mut self, index: BlockIndex) -> Block {
        assert!(self.length > 1, "Cannot unlink the anchor block");

        let block = self.slots[index.0].take().expect("Linked block");

        match block.prev {
            Some(prev) => self.get_mut(prev).next = block.next,
            None => self.first = block.next.expect("Not the last block"),
        }

        match block.next {
            Some(next) => self.get_mut(next).prev = block.prev,
            None => self.last = block.prev.expect("Not the first block"),
        }

        self.vacant.push(index);
        self.length -= 1;

        block
    }
}

/// Iterator over the blocks of a chain, in chain order.
pub(crate) struct Iter<'a> {
    chain: &'a BlockChain,
    cursor: Option<BlockIndex>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (BlockIndex, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let block = self.chain.get(index);

        self.cursor = block.next;

        Some((index, block))
    }
}
