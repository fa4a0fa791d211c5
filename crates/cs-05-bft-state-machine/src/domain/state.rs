//! Per-height BFT state and its transition rules.
//!
//! `BftState` is pure: it never signs, sends or waits. The state handler
//! compares `(round, step)` before and after each call and performs the
//! entry action of whatever step was reached.

use super::{
    BftError, BftResult, BlockSet, NewRoundSet, ProposalSet, RoundStep, VoteSet,
};
use cs_01_consensus_messages::{
    MessageError, NewRoundMsg, Proposal, SignableMessage, VoteMsg, VoteType,
};
use shared_types::{hash_hex, Address, Block, Hash};
use tracing::{debug, info};

/// A decided block: more than two thirds precommitted `block_id` at `round`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDecision {
    pub height: u64,
    pub round: u64,
    pub block_id: Hash,
    /// The precommits on `block_id`, ordered by voter.
    pub commits: Vec<VoteMsg>,
}

/// Snapshot of the state for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState<B> {
    pub height: u64,
    pub round: u64,
    pub step: RoundStep,
    pub locked_block: Option<B>,
    pub locked_round: u64,
    pub block_pool_not_empty: bool,
    pub verifiers: Vec<Address>,
}

/// Consensus state of the current height.
#[derive(Debug, Clone)]
pub struct BftState<B> {
    height: u64,
    round: u64,
    step: RoundStep,
    block_pool_not_empty: bool,
    verifiers: Vec<Address>,
    locked_block: Option<B>,
    locked_round: u64,
    commit_round: Option<u64>,
    max_proposal_round_ahead: u64,

    new_round_set: NewRoundSet,
    proposals: ProposalSet,
    blocks: BlockSet<B>,
    pre_votes: VoteSet,
    votes: VoteSet,
}

impl<B: Block> BftState<B> {
    /// Empty state at height 0; call [`Self::enter_new_height`] before use.
    pub fn new(max_proposal_round_ahead: u64) -> Self {
        Self {
            height: 0,
            round: 0,
            step: RoundStep::NewHeight,
            block_pool_not_empty: false,
            verifiers: Vec::new(),
            locked_block: None,
            locked_round: 0,
            commit_round: None,
            max_proposal_round_ahead,
            new_round_set: NewRoundSet::default(),
            proposals: ProposalSet::new(),
            blocks: BlockSet::new(),
            pre_votes: VoteSet::new(0, VoteType::PreVote, Vec::new()),
            votes: VoteSet::new(0, VoteType::PreCommit, Vec::new()),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn step(&self) -> RoundStep {
        self.step
    }

    /// `(round, step)`, the part of the state entry actions depend on.
    pub fn position(&self) -> (u64, RoundStep) {
        (self.round, self.step)
    }

    pub fn verifiers(&self) -> &[Address] {
        &self.verifiers
    }

    pub fn is_verifier(&self, address: &Address) -> bool {
        self.verifiers.contains(address)
    }

    pub fn block_pool_not_empty(&self) -> bool {
        self.block_pool_not_empty
    }

    pub fn locked_block(&self) -> Option<&B> {
        self.locked_block.as_ref()
    }

    pub fn locked_round(&self) -> u64 {
        self.locked_round
    }

    pub fn commit_round(&self) -> Option<u64> {
        self.commit_round
    }

    pub fn new_round_set(&self) -> &NewRoundSet {
        &self.new_round_set
    }

    pub fn proposal_at_round(&self, round: u64) -> Option<&Proposal> {
        self.proposals.get(round)
    }

    pub fn block_at_round(&self, round: u64) -> Option<&B> {
        self.blocks.get(round)
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<&B> {
        self.blocks.get_by_hash(hash)
    }

    pub fn pre_votes(&self) -> &VoteSet {
        &self.pre_votes
    }

    pub fn votes(&self) -> &VoteSet {
        &self.votes
    }

    pub fn snapshot(&self) -> RoundState<B> {
        RoundState {
            height: self.height,
            round: self.round,
            step: self.step,
            locked_block: self.locked_block.clone(),
            locked_round: self.locked_round,
            block_pool_not_empty: self.block_pool_not_empty,
            verifiers: self.verifiers.clone(),
        }
    }

    /// `verifiers[round mod n]`; `None` only before the first height.
    pub fn proposer_at_round(&self, round: u64) -> Option<Address> {
        if self.verifiers.is_empty() {
            return None;
        }
        let index = (round % self.verifiers.len() as u64) as usize;
        self.verifiers.get(index).copied()
    }

    pub fn is_proposer(&self, address: &Address) -> bool {
        self.proposer_at_round(self.round).as_ref() == Some(address)
    }

    // =========================================================================
    // HEIGHT AND ROUND
    // =========================================================================

    /// Reset everything for `height`, starting at `round`.
    ///
    /// # Errors
    ///
    /// `NoVerifiers` when `verifiers` is empty; the state is left unchanged.
    pub fn enter_new_height(
        &mut self,
        height: u64,
        round: u64,
        verifiers: Vec<Address>,
    ) -> BftResult<()> {
        if verifiers.is_empty() {
            return Err(BftError::NoVerifiers(height));
        }
        self.height = height;
        self.round = round;
        self.step = RoundStep::NewHeight;
        self.block_pool_not_empty = false;
        self.locked_block = None;
        self.locked_round = 0;
        self.commit_round = None;
        self.new_round_set = NewRoundSet::new(height, verifiers.clone());
        self.proposals = ProposalSet::new();
        self.blocks = BlockSet::new();
        self.pre_votes = VoteSet::new(height, VoteType::PreVote, verifiers.clone());
        self.votes = VoteSet::new(height, VoteType::PreCommit, verifiers.clone());
        self.verifiers = verifiers;
        Ok(())
    }

    fn enter_new_round(&mut self, round: u64) {
        debug!(height = self.height, from = self.round, to = round, "Enter new round");
        self.round = round;
        self.step = RoundStep::NewRound;
    }

    /// The pool has a block to propose.
    pub fn on_block_pool_not_empty(&mut self) {
        self.block_pool_not_empty = true;
        if self.step == RoundStep::NewHeight {
            self.enter_new_round(self.round);
        } else {
            self.try_enter_propose();
        }
    }

    pub fn on_new_round(&mut self, msg: &NewRoundMsg) -> BftResult<()> {
        self.check_height(msg.height)?;
        self.new_round_set.add(msg)?;

        let maj32 = self.new_round_set.maj32();
        if self.round < maj32 {
            info!(height = self.height, round = self.round, maj32, "Catch up to round");
            self.enter_new_round(maj32);
        }
        self.try_enter_propose();
        Ok(())
    }

    fn try_enter_propose(&mut self) {
        if self.block_pool_not_empty
            && self.step == RoundStep::NewRound
            && self.new_round_set.enough_at_round(self.round)
        {
            self.enter_propose();
        }
    }

    fn enter_propose(&mut self) {
        self.step = RoundStep::Propose;
        let known = match (self.proposals.get(self.round), self.blocks.get(self.round)) {
            (Some(p), Some(b)) => p.block_id == b.hash(),
            _ => false,
        };
        if known {
            self.enter_pre_vote(self.round);
        }
    }

    fn enter_pre_vote(&mut self, round: u64) {
        if round != self.round || self.step != RoundStep::Propose {
            return;
        }
        self.step = RoundStep::PreVote;
    }

    fn enter_pre_commit(&mut self, round: u64) {
        if round != self.round || self.step != RoundStep::PreVote {
            return;
        }
        self.step = RoundStep::PreCommit;
    }

    // =========================================================================
    // PROPOSALS
    // =========================================================================

    /// Checks that need no block: height, round window, uniqueness, witness
    /// and proposer.
    pub fn valid_proposal(&self, proposal: &Proposal) -> BftResult<()> {
        self.check_height(proposal.height)?;
        let last = self.round.saturating_add(self.max_proposal_round_ahead);
        if proposal.round < self.round || proposal.round > last {
            return Err(MessageError::InvalidProposal(format!(
                "round {} outside {}..={}",
                proposal.round, self.round, last
            ))
            .into());
        }
        if self.proposals.have(proposal.round) {
            return Err(MessageError::InvalidProposal(format!(
                "already have a proposal for round {}",
                proposal.round
            ))
            .into());
        }
        proposal.valid()?;
        let signer = proposal.signer().ok_or(MessageError::MissingWitness)?;
        let proposer = self
            .proposer_at_round(proposal.round)
            .ok_or(BftError::NoVerifiers(self.height))?;
        if signer != proposer {
            return Err(MessageError::InvalidProposal(format!(
                "{signer} is not the proposer of round {}",
                proposal.round
            ))
            .into());
        }
        Ok(())
    }

    /// Record a validated proposal and its block.
    ///
    /// Moves to PreVote only for the current round while in Propose; any
    /// other proposal is stored so matching votes can still be finalized.
    pub fn on_new_proposal(&mut self, proposal: Proposal, block: B) -> BftResult<()> {
        self.valid_proposal(&proposal)?;
        if block.hash() != proposal.block_id {
            return Err(MessageError::InvalidProposal(format!(
                "block {} does not match proposal {}",
                hash_hex(&block.hash()),
                hash_hex(&proposal.block_id)
            ))
            .into());
        }

        let round = proposal.round;
        self.proposals.add(proposal);
        self.blocks.add(round, block);

        if round == self.round && self.step == RoundStep::Propose {
            self.enter_pre_vote(round);
        }
        Ok(())
    }

    /// PreVote for the locked block, else for the current round's proposal
    /// block when it matches the proposal.
    pub fn make_prevote(&self) -> Option<VoteMsg> {
        if let Some(locked) = &self.locked_block {
            return Some(VoteMsg::pre_vote(self.height, self.round, locked.hash()));
        }
        let proposal = self.proposals.get(self.round)?;
        let block = self.blocks.get(self.round)?;
        (block.hash() == proposal.block_id)
            .then(|| VoteMsg::pre_vote(self.height, self.round, proposal.block_id))
    }

    /// PreCommit for the locked block; nothing when unlocked.
    pub fn make_vote(&self) -> Option<VoteMsg> {
        self.locked_block
            .as_ref()
            .map(|locked| VoteMsg::pre_commit(self.height, self.round, locked.hash()))
    }

    // =========================================================================
    // VOTES
    // =========================================================================

    pub fn on_pre_vote(&mut self, pre_vote: &VoteMsg) -> BftResult<()> {
        self.check_height(pre_vote.height)?;
        self.pre_votes.add_vote(pre_vote)?;

        let Some(round_block) = self.pre_votes.votes_enough(pre_vote.round) else {
            return Ok(());
        };

        if self.locked_block.is_some()
            && pre_vote.round >= self.round
            && self.locked_round < pre_vote.round
        {
            info!(
                height = self.height,
                locked_round = self.locked_round,
                round = pre_vote.round,
                "Release lock"
            );
            // `locked_round` keeps the released round; only `locked_block`
            // says whether a lock is held.
            self.locked_block = None;
        }

        if self.locked_block.is_none() {
            match self.blocks.get(pre_vote.round) {
                Some(block) if block.hash() == round_block => {
                    info!(
                        height = self.height,
                        round = pre_vote.round,
                        block = %hash_hex(&round_block),
                        "Lock block"
                    );
                    self.locked_block = Some(block.clone());
                    self.locked_round = pre_vote.round;
                    self.enter_pre_commit(pre_vote.round);
                }
                _ => debug!(
                    round = pre_vote.round,
                    block = %hash_hex(&round_block),
                    "Majority block not known yet"
                ),
            }
        }
        Ok(())
    }

    /// Record a precommit and report a commit when one is due.
    pub fn on_vote(&mut self, vote: &VoteMsg) -> BftResult<Option<CommitDecision>> {
        self.check_height(vote.height)?;
        self.votes.add_vote(vote)?;

        if self.commit_round.is_some() || vote.round < self.round {
            return Ok(None);
        }
        let Some(block_id) = self.votes.votes_enough(vote.round) else {
            return Ok(None);
        };
        Ok(Some(CommitDecision {
            height: self.height,
            round: vote.round,
            block_id,
            commits: self.votes.final_verifications(vote.round),
        }))
    }

    /// Remember that the block decided at `round` was saved.
    pub fn mark_committed(&mut self, round: u64) {
        self.commit_round = Some(round);
    }

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    pub fn on_propose_timeout(&mut self) {
        if self.step == RoundStep::Propose {
            self.enter_new_round(self.round + 1);
        }
    }

    pub fn on_pre_vote_timeout(&mut self) {
        self.enter_new_round(self.round + 1);
    }

    pub fn on_pre_commit_timeout(&mut self) {
        self.enter_new_round(self.round + 1);
    }

    /// Verifiers whose NewRound for the current round is still missing.
    /// Empty unless waiting in NewRound.
    pub fn new_round_req_list(&self) -> Vec<Address> {
        if self.step != RoundStep::NewRound {
            return Vec::new();
        }
        self.new_round_set.missing_at_round(self.round)
    }

    pub fn enough_new_round(&self) -> bool {
        self.new_round_set.enough_at_round(self.round)
    }

    fn check_height(&self, height: u64) -> BftResult<()> {
        if height != self.height {
            return Err(MessageError::WrongHeight {
                expected: self.height,
                actual: height,
            }
            .into());
        }
        Ok(())
    }
}
