//! Driven ports (Outbound dependencies)
//!
//! Sync ports answer from local state and must not block. Async ports cross
//! into other actors or the network.

use async_trait::async_trait;
use cs_01_consensus_messages::{ConsensusMessage, ReqRoundMsg, VoteMsg};
use shared_types::{Address, Block, ChainResult, Hash, MsgCode};

/// Read access to the chain plus the commit sink.
pub trait ChainReader<B: Block>: Send + Sync {
    /// Current chain head.
    fn current_block(&self) -> B;

    /// Precommits that committed the block at `height`.
    fn get_seen_commit(&self, height: u64) -> Vec<VoteMsg>;

    /// Persist a decided block with its precommits.
    ///
    /// `AlreadyHaveThisBlock` counts as success for the caller.
    fn save_block(&self, block: B, commits: Vec<VoteMsg>) -> ChainResult<()>;

    /// Whether the verifier set changes after `block`.
    fn is_change_point(&self, block: &B, packaging: bool) -> bool;

    fn get_curr_verifiers(&self) -> Vec<Address>;

    fn get_next_verifiers(&self) -> Vec<Address>;
}

/// Full block validation against the chain.
pub trait Validator<B: Block>: Send + Sync {
    fn full_valid(&self, block: &B) -> Result<(), String>;
}

/// Outgoing consensus traffic.
#[async_trait]
pub trait MsgSender<B: Block>: Send + Sync {
    /// Send `msg` to every other verifier.
    async fn broadcast(&self, code: MsgCode, msg: ConsensusMessage<B>) -> Result<(), String>;

    /// Ask `to` for their NewRound messages.
    async fn send_req_round(
        &self,
        code: MsgCode,
        to: &[Address],
        msg: ReqRoundMsg,
    ) -> Result<(), String>;

    /// Publish a committed block.
    async fn broadcast_block(&self, block: B) -> Result<(), String>;
}

/// Block pool as seen by the state machine.
#[async_trait]
pub trait BlockPoolGateway<B: Block>: Send + Sync {
    async fn new_height(&self, height: u64);

    async fn get_block_by_hash(&self, hash: &Hash) -> Option<B>;

    /// Remove and return the oldest pool block.
    async fn get_proposal_block(&self) -> Option<B>;
}

/// Pulls a block the node does not have from a peer.
#[async_trait]
pub trait FetcherGateway<B: Block>: Send + Sync {
    async fn fetch_block(&self, from: Address, hash: Hash) -> Option<B>;
}
