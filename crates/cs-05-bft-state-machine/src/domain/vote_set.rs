//! PreVote and PreCommit tallies.

use super::two_thirds_majority;
use cs_01_consensus_messages::{MessageError, MessageResult, SignableMessage, VoteMsg, VoteType};
use shared_types::{Address, Hash};
use std::collections::{BTreeMap, HashMap};

/// Votes of one type at one height.
///
/// Holds at most one vote per `(round, verifier)` and keeps a per-round count
/// for every block hash voted on.
#[derive(Debug, Clone)]
pub struct VoteSet {
    height: u64,
    vote_type: VoteType,
    verifiers: Vec<Address>,
    votes: BTreeMap<u64, BTreeMap<Address, VoteMsg>>,
    tallies: BTreeMap<u64, HashMap<Hash, usize>>,
}

impl VoteSet {
    pub fn new(height: u64, vote_type: VoteType, verifiers: Vec<Address>) -> Self {
        Self {
            height,
            vote_type,
            verifiers,
            votes: BTreeMap::new(),
            tallies: BTreeMap::new(),
        }
    }

    pub fn vote_type(&self) -> VoteType {
        self.vote_type
    }

    /// Validate and record `vote`.
    pub fn add_vote(&mut self, vote: &VoteMsg) -> MessageResult<()> {
        if vote.height != self.height {
            return Err(MessageError::WrongHeight {
                expected: self.height,
                actual: vote.height,
            });
        }
        if vote.vote_type != self.vote_type {
            return Err(MessageError::WrongVoteType {
                expected: self.vote_type,
                actual: vote.vote_type,
            });
        }
        let voter = vote.voter().ok_or(MessageError::MissingWitness)?;
        if !self.verifiers.contains(&voter) {
            return Err(MessageError::NotCurrentVerifier(voter));
        }
        vote.valid()?;

        let round_votes = self.votes.entry(vote.round).or_default();
        if round_votes.contains_key(&voter) {
            return Err(MessageError::DuplicateVote {
                voter,
                round: vote.round,
            });
        }
        round_votes.insert(voter, vote.clone());
        *self
            .tallies
            .entry(vote.round)
            .or_default()
            .entry(vote.block_id)
            .or_insert(0) += 1;
        Ok(())
    }

    /// The block hash backed by more than two thirds of the verifiers at
    /// `round`, if any.
    pub fn votes_enough(&self, round: u64) -> Option<Hash> {
        if self.verifiers.is_empty() {
            return None;
        }
        let needed = two_thirds_majority(self.verifiers.len());
        self.tallies
            .get(&round)?
            .iter()
            .find(|(_, count)| **count >= needed)
            .map(|(hash, _)| *hash)
    }

    /// Votes at `round` on the majority hash, ordered by voter address.
    pub fn final_verifications(&self, round: u64) -> Vec<VoteMsg> {
        let Some(hash) = self.votes_enough(round) else {
            return Vec::new();
        };
        self.votes
            .get(&round)
            .map(|votes| {
                votes
                    .values()
                    .filter(|v| v.block_id == hash)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count_at_round(&self, round: u64) -> usize {
        self.votes.get(&round).map_or(0, BTreeMap::len)
    }

    pub fn get(&self, round: u64, voter: &Address) -> Option<&VoteMsg> {
        self.votes.get(&round)?.get(voter)
    }
}
