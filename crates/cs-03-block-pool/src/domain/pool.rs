//! Pool state owned by the pool loop.

use super::{PoolError, PoolResult};
use shared_types::{Block, Hash};

/// Blocks waiting to be proposed at `height`, oldest first.
#[derive(Debug, Clone)]
pub struct PoolState<B> {
    height: u64,
    blocks: Vec<B>,
}

impl<B: Block> PoolState<B> {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            blocks: Vec::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Move to height `h`, dropping every stored block. Heights at or below
    /// the current one are ignored; returns whether the move happened.
    pub fn new_height(&mut self, h: u64) -> bool {
        if h <= self.height {
            return false;
        }
        self.height = h;
        self.blocks.clear();
        true
    }

    /// Append `block`. Returns `true` when the pool was empty before.
    pub fn add_block(&mut self, block: B) -> PoolResult<bool> {
        if block.number() != self.height {
            return Err(PoolError::InvalidHeightBlock {
                expected: self.height,
                actual: block.number(),
            });
        }
        let hash = block.hash();
        if self.blocks.iter().any(|b| b.hash() == hash) {
            return Err(PoolError::DuplicateBlock(hash));
        }
        let was_empty = self.blocks.is_empty();
        self.blocks.push(block);
        Ok(was_empty)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<&B> {
        self.blocks.iter().find(|b| &b.hash() == hash)
    }

    /// Remove and return the oldest block.
    pub fn take_proposal_block(&mut self) -> Option<B> {
        if self.blocks.is_empty() {
            None
        } else {
            Some(self.blocks.remove(0))
        }
    }

    /// Remove the block with `hash`; returns whether one was stored.
    pub fn remove_block(&mut self, hash: &Hash) -> bool {
        match self.blocks.iter().position(|b| &b.hash() == hash) {
            Some(index) => {
                self.blocks.remove(index);
                true
            }
            None => false,
        }
    }
}
