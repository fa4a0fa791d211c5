//! Round-level consensus messages: NewRound, Proposal, PreVote and Vote.

use super::{SignableMessage, WitMsg};
use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, saturating to zero on a clock before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// NEW ROUND
// =============================================================================

/// Announces that the sender entered `round` at `height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoundMsg {
    pub height: u64,
    pub round: u64,
    pub witness: Option<WitMsg>,
}

impl NewRoundMsg {
    pub fn new(height: u64, round: u64) -> Self {
        Self {
            height,
            round,
            witness: None,
        }
    }
}

impl SignableMessage for NewRoundMsg {
    fn witness(&self) -> Option<&WitMsg> {
        self.witness.as_ref()
    }

    fn set_witness(&mut self, witness: Option<WitMsg>) {
        self.witness = witness;
    }
}

// =============================================================================
// PROPOSAL
// =============================================================================

/// A proposer's block choice for `(height, round)`.
///
/// `block_id` must equal the hash of the referenced block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub height: u64,
    pub round: u64,
    pub block_id: Hash,
    pub timestamp: u64,
    pub witness: Option<WitMsg>,
}

impl Proposal {
    pub fn new(height: u64, round: u64, block_id: Hash) -> Self {
        Self {
            height,
            round,
            block_id,
            timestamp: unix_millis(),
            witness: None,
        }
    }
}

impl SignableMessage for Proposal {
    fn witness(&self) -> Option<&WitMsg> {
        self.witness.as_ref()
    }

    fn set_witness(&mut self, witness: Option<WitMsg>) {
        self.witness = witness;
    }
}

// =============================================================================
// VOTES
// =============================================================================

/// Phase a vote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteType {
    PreVote,
    PreCommit,
}

/// A PreVote or PreCommit on `block_id` at `(height, round)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteMsg {
    pub height: u64,
    pub round: u64,
    pub block_id: Hash,
    pub vote_type: VoteType,
    pub timestamp: u64,
    pub witness: Option<WitMsg>,
}

impl VoteMsg {
    pub fn new(height: u64, round: u64, block_id: Hash, vote_type: VoteType) -> Self {
        Self {
            height,
            round,
            block_id,
            vote_type,
            timestamp: unix_millis(),
            witness: None,
        }
    }

    pub fn pre_vote(height: u64, round: u64, block_id: Hash) -> Self {
        Self::new(height, round, block_id, VoteType::PreVote)
    }

    pub fn pre_commit(height: u64, round: u64, block_id: Hash) -> Self {
        Self::new(height, round, block_id, VoteType::PreCommit)
    }

    /// Voter address; `None` for an unsigned vote.
    pub fn voter(&self) -> Option<Address> {
        self.signer()
    }
}

impl SignableMessage for VoteMsg {
    fn witness(&self) -> Option<&WitMsg> {
        self.witness.as_ref()
    }

    fn set_witness(&mut self, witness: Option<WitMsg>) {
        self.witness = witness;
    }
}
