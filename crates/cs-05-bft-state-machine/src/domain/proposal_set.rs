//! Proposals and proposal blocks, one per round.

use cs_01_consensus_messages::Proposal;
use shared_types::{Block, Hash};
use std::collections::BTreeMap;

/// Accepted proposals of one height.
#[derive(Debug, Clone, Default)]
pub struct ProposalSet {
    proposals: BTreeMap<u64, Proposal>,
}

impl ProposalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn have(&self, round: u64) -> bool {
        self.proposals.contains_key(&round)
    }

    /// Record `proposal` unless its round already has one. Returns whether
    /// it was stored.
    pub fn add(&mut self, proposal: Proposal) -> bool {
        if self.have(proposal.round) {
            return false;
        }
        self.proposals.insert(proposal.round, proposal);
        true
    }

    pub fn get(&self, round: u64) -> Option<&Proposal> {
        self.proposals.get(&round)
    }
}

/// Proposal blocks of one height, by round.
#[derive(Debug, Clone)]
pub struct BlockSet<B> {
    blocks: BTreeMap<u64, B>,
}

impl<B> Default for BlockSet<B> {
    fn default() -> Self {
        Self {
            blocks: BTreeMap::new(),
        }
    }
}

impl<B: Block> BlockSet<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, round: u64, block: B) {
        self.blocks.entry(round).or_insert(block);
    }

    pub fn get(&self, round: u64) -> Option<&B> {
        self.blocks.get(&round)
    }

    pub fn get_by_hash(&self, hash: &Hash) -> Option<&B> {
        self.blocks.values().find(|b| &b.hash() == hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
