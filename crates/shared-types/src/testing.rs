//! Test doubles shared by downstream test suites.

use crate::{keccak256, Block, Hash};

/// Minimal block carrying just what the `Block` trait exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBlock {
    pub number: u64,
    pub hash: Hash,
    pub special: bool,
}

impl TestBlock {
    /// Block at `number` whose hash is derived from `(number, salt)`.
    pub fn new(number: u64, salt: u8) -> Self {
        let mut seed = number.to_be_bytes().to_vec();
        seed.push(salt);
        Self {
            number,
            hash: keccak256(&seed),
            special: false,
        }
    }

    /// Block with an explicit hash.
    pub fn with_hash(number: u64, hash: Hash) -> Self {
        Self {
            number,
            hash,
            special: false,
        }
    }

    pub fn special(mut self) -> Self {
        self.special = true;
        self
    }
}

impl Block for TestBlock {
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
