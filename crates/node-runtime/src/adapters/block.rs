//! Devnet block.
//!
//! The consensus core sees a block only through the `Block` trait. The
//! devnet block adds the link to its parent and the producer so the
//! in-memory chain can check that a decided block extends its head.

use serde::{Deserialize, Serialize};
use shared_types::{keccak256, Address, Block, Hash, ADDRESS_LENGTH};

/// Block produced and agreed on by the local devnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevBlock {
    pub number: u64,
    pub parent_hash: Hash,
    pub producer: Address,
    pub timestamp: u64,
    pub special: bool,
    hash: Hash,
}

impl DevBlock {
    pub fn new(number: u64, parent_hash: Hash, producer: Address, timestamp: u64) -> Self {
        let mut block = Self {
            number,
            parent_hash,
            producer,
            timestamp,
            special: false,
            hash: [0u8; 32],
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn genesis() -> Self {
        Self::new(0, [0u8; 32], Address([0u8; ADDRESS_LENGTH]), 0)
    }

    /// Child of `parent` produced by `producer`.
    pub fn child_of(parent: &DevBlock, producer: Address, timestamp: u64) -> Self {
        Self::new(parent.number + 1, parent.hash, producer, timestamp)
    }

    /// Mark the block special; special blocks are never proposed.
    pub fn into_special(mut self) -> Self {
        self.special = true;
        self.hash = self.compute_hash();
        self
    }

    /// Whether the stored hash matches the header fields.
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    fn compute_hash(&self) -> Hash {
        let mut header = Vec::with_capacity(8 + 32 + ADDRESS_LENGTH + 8 + 1);
        header.extend_from_slice(&self.number.to_be_bytes());
        header.extend_from_slice(&self.parent_hash);
        header.extend_from_slice(self.producer.as_bytes());
        header.extend_from_slice(&self.timestamp.to_be_bytes());
        header.push(u8::from(self.special));
        keccak256(&header)
    }
}

impl Block for DevBlock {
    fn number(&self) -> u64 {
        self.number
    }

    fn hash(&self) -> Hash {
        self.hash
    }

    fn is_special(&self) -> bool {
        self.special
    }
}
