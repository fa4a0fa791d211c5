//! Signed message builders for a committee of random keys.

use cs_01_consensus_messages::{
    KeyPairSigner, MsgSigner, NewRoundMsg, Proposal, SignableMessage, VoteMsg,
};
use shared_types::{Address, Hash};

#[derive(Clone)]
pub(crate) struct Committee {
    signers: Vec<KeyPairSigner>,
}

impl Committee {
    pub fn new(n: usize) -> Self {
        Self {
            signers: (0..n).map(|_| KeyPairSigner::generate()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.signers.len()
    }

    pub fn verifiers(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    pub fn signer(&self, i: usize) -> &KeyPairSigner {
        &self.signers[i]
    }

    pub fn index_of_proposer(&self, round: u64) -> usize {
        (round % self.signers.len() as u64) as usize
    }

    pub fn new_round(&self, i: usize, height: u64, round: u64) -> NewRoundMsg {
        NewRoundMsg::new(height, round)
            .sign_with(self.signer(i))
            .unwrap()
    }

    pub fn proposal(&self, i: usize, height: u64, round: u64, block_id: Hash) -> Proposal {
        Proposal::new(height, round, block_id)
            .sign_with(self.signer(i))
            .unwrap()
    }

    pub fn pre_vote(&self, i: usize, height: u64, round: u64, block_id: Hash) -> VoteMsg {
        VoteMsg::pre_vote(height, round, block_id)
            .sign_with(self.signer(i))
            .unwrap()
    }

    pub fn vote(&self, i: usize, height: u64, round: u64, block_id: Hash) -> VoteMsg {
        VoteMsg::pre_commit(height, round, block_id)
            .sign_with(self.signer(i))
            .unwrap()
    }
}
