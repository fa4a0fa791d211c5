//! # CS-BFT Node
//!
//! Cluster-wide wiring of one verifier: owns the block pool, the fetcher and
//! the state handler while the node is in the verifier set, and routes every
//! P2P message by code.
//!
//! ```text
//!                 on_new_p2p_msg(from, msg)
//!                            │
//!   ┌────────────┬───────────┼─────────────┬──────────────┬──────────────┐
//!   ▼            ▼           ▼             ▼              ▼              ▼
//! NewRound   FetchReq    FetchResp     SyncBlock     ReqNewRound
//! Proposal   (pool or    (fetcher)     (fetch from   (resend own
//! PreVote     block set)                sender into   NewRound msgs)
//! Vote                                  the pool)
//!   │
//!   ▼
//! round message forwarder ──▶ StateHandler ◀── BlockPool (not empty)
//!                                  │
//!                                  └──▶ FetcherHandle ──▶ peers
//! ```
//!
//! Round messages go through a forwarder queue of `channel_capacity` slots,
//! so a handler blocked on a fetch still gets its `FetchResp` while the
//! queue has room. A full queue blocks the dispatcher until the handler
//! drains it or the fetch times out.

mod error;
mod ports;

#[cfg(test)]
mod tests;

pub use error::{NodeError, NodeResult};
pub use ports::PeerSender;

use crate::adapters::PoolNotifierBridge;
use crate::container::NodeConfig;
use cs_01_consensus_messages::{
    ConsensusMessage, FetchBlockReqMsg, FetchBlockRespMsg, MsgSigner, ReqRoundMsg, SyncBlockMsg,
};
use cs_03_block_pool::{BlockPool, BlockPoolHandle, PoolEventNotifier, PoolStatus};
use cs_04_block_fetcher::{BlockFetcher, FetcherConn, FetcherHandle};
use cs_05_bft_state_machine::{
    BftDependencies, BftHandle, ChainReader, MsgSender, RoundState, StateHandler, Validator,
};
use parking_lot::Mutex;
use shared_types::{hash_hex, Address, Block, Hash, MsgCode};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Collaborators of a node.
pub struct NodeDependencies<B: Block> {
    pub chain: Arc<dyn ChainReader<B>>,
    pub validator: Arc<dyn Validator<B>>,
    pub sender: Arc<dyn MsgSender<B>>,
    pub conn: Arc<dyn FetcherConn>,
    pub peers: Arc<dyn PeerSender<B>>,
    pub signer: Arc<dyn MsgSigner>,
}

impl<B: Block> Clone for NodeDependencies<B> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            validator: Arc::clone(&self.validator),
            sender: Arc::clone(&self.sender),
            conn: Arc::clone(&self.conn),
            peers: Arc::clone(&self.peers),
            signer: Arc::clone(&self.signer),
        }
    }
}

/// One verifier node.
pub struct CsBftNode<B: Block> {
    config: NodeConfig,
    deps: NodeDependencies<B>,
    running: Mutex<Option<Running<B>>>,
}

impl<B: Block> CsBftNode<B> {
    pub fn new(config: NodeConfig, deps: NodeDependencies<B>) -> Self {
        Self {
            config,
            deps,
            running: Mutex::new(None),
        }
    }

    pub fn address(&self) -> Address {
        self.deps.signer.address()
    }

    /// Whether this node runs the next height: the next epoch's set decides
    /// when the chain head is a change point.
    pub fn is_current_verifier(&self) -> bool {
        let head = self.deps.chain.current_block();
        let verifiers = if self.deps.chain.is_change_point(&head, false) {
            self.deps.chain.get_next_verifiers()
        } else {
            self.deps.chain.get_curr_verifiers()
        };
        verifiers.contains(&self.address())
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(Running::is_running)
    }

    /// Spawn the pool, fetcher and state handler if this node is a verifier.
    /// Returns whether consensus runs afterwards; calling it again while
    /// running changes nothing.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(Running::is_running) {
            return true;
        }
        if !self.is_current_verifier() {
            info!(address = %self.address(), "Not a verifier, consensus not started");
            *running = None;
            return false;
        }

        let next = self.deps.chain.current_block().number() + 1;
        let bridge = Arc::new(PoolNotifierBridge::<B>::new());
        let notifier: Arc<dyn PoolEventNotifier> = bridge.clone();
        let (pool, _) = BlockPool::spawn(&self.config.pool, next, notifier);
        let (fetcher, _) = BlockFetcher::spawn(&self.config.fetcher, Arc::clone(&self.deps.conn));
        let (bft, _) = StateHandler::spawn(
            self.config.bft.clone(),
            BftDependencies {
                chain: Arc::clone(&self.deps.chain),
                validator: Arc::clone(&self.deps.validator),
                sender: Arc::clone(&self.deps.sender),
                signer: Arc::clone(&self.deps.signer),
                pool: Arc::new(pool.clone()),
                fetcher: Arc::new(fetcher.clone()),
            },
        );
        bridge.bind(bft.clone());

        let (round_msgs, inbound) = mpsc::channel(self.config.bft.channel_capacity.max(1));
        tokio::spawn(forward_round_messages(bft.clone(), inbound));

        *running = Some(Running {
            bft,
            pool,
            fetcher,
            round_msgs,
            chain: Arc::clone(&self.deps.chain),
            sender: Arc::clone(&self.deps.sender),
            peers: Arc::clone(&self.deps.peers),
        });
        info!(address = %self.address(), height = next, "Consensus started");
        true
    }

    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.stop();
            info!(address = %self.address(), "Consensus stopped");
        }
    }

    /// Re-evaluate membership after a verifier set change: start and enter
    /// the next height when still a verifier, stop otherwise.
    pub async fn change_primary(&self) {
        if self.is_current_verifier() {
            if self.start() {
                let next = self.deps.chain.current_block().number() + 1;
                self.on_enter_new_height(next).await;
            }
        } else if self.is_running() {
            info!(address = %self.address(), "Left the verifier set");
            self.stop();
        }
    }

    pub async fn on_enter_new_height(&self, height: u64) {
        let Some(running) = self.running() else {
            return;
        };
        running.bft.new_height(height).await;
        // Entering a height clears the handler's pool flag; a pool filled for
        // `height` before that must be announced again.
        if let Ok(status) = running.pool.status().await {
            if status.height == height && status.len > 0 {
                running.bft.block_pool_not_empty().await;
            }
        }
    }

    /// React to a newly saved chain head.
    pub async fn on_chain_head(&self) {
        let head = self.deps.chain.current_block();
        if self.deps.chain.is_change_point(&head, false) {
            self.change_primary().await;
        } else {
            self.on_enter_new_height(head.number() + 1).await;
        }
    }

    /// Pool a candidate block and announce it to the other verifiers after
    /// the sync delay.
    pub async fn on_new_wait_verify_block(&self, block: B) -> NodeResult<()> {
        let running = self.running().ok_or(NodeError::NotRunning)?;
        let block_hash = block.hash();
        let number = block.number();
        running.pool_block(block).await?;
        debug!(height = number, block = %hash_hex(&block_hash), "Candidate block pooled");

        let delay = self.config.sync_block_delay;
        let sender = Arc::clone(&running.sender);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let msg = ConsensusMessage::SyncBlock(SyncBlockMsg { block_hash });
            if let Err(e) = sender.broadcast(MsgCode::SyncBlock, msg).await {
                warn!(block = %hash_hex(&block_hash), error = %e, "Sync block broadcast failed");
            }
        });
        Ok(())
    }

    /// Route one P2P message by its code.
    pub async fn on_new_p2p_msg(&self, from: Address, msg: ConsensusMessage<B>) {
        let Some(running) = self.running() else {
            trace!(from = %from, code = ?msg.code(), "Consensus not running, message dropped");
            return;
        };
        match msg {
            ConsensusMessage::NewRound(_)
            | ConsensusMessage::Proposal(_)
            | ConsensusMessage::PreVote(_)
            | ConsensusMessage::Vote(_) => {
                if running.round_msgs.send(msg).await.is_err() {
                    debug!(from = %from, "Round message forwarder stopped");
                }
            }
            ConsensusMessage::FetchReq(req) => {
                tokio::spawn(running.answer_fetch(from, req));
            }
            ConsensusMessage::FetchResp(resp) => {
                if let Err(e) = running.fetcher.fetch_block_resp(resp).await {
                    debug!(from = %from, error = %e, "Fetch response dropped");
                }
            }
            ConsensusMessage::SyncBlock(sync) => {
                tokio::spawn(running.on_sync_block(from, sync.block_hash));
            }
            ConsensusMessage::ReqNewRound(req) => {
                tokio::spawn(running.answer_round_request(from, req));
            }
        }
    }

    pub async fn round_state(&self) -> Option<RoundState<B>> {
        self.running()?.bft.round_state().await.ok()
    }

    pub async fn pool_status(&self) -> Option<PoolStatus> {
        self.running()?.pool.status().await.ok()
    }

    fn running(&self) -> Option<Running<B>> {
        self.running.lock().clone()
    }
}

// =============================================================================
// RUNNING SUBSYSTEMS
// =============================================================================

/// Handles of the subsystems of a started node.
struct Running<B: Block> {
    bft: BftHandle<B>,
    pool: BlockPoolHandle<B>,
    fetcher: FetcherHandle<B>,
    round_msgs: mpsc::Sender<ConsensusMessage<B>>,
    chain: Arc<dyn ChainReader<B>>,
    sender: Arc<dyn MsgSender<B>>,
    peers: Arc<dyn PeerSender<B>>,
}

impl<B: Block> Clone for Running<B> {
    fn clone(&self) -> Self {
        Self {
            bft: self.bft.clone(),
            pool: self.pool.clone(),
            fetcher: self.fetcher.clone(),
            round_msgs: self.round_msgs.clone(),
            chain: Arc::clone(&self.chain),
            sender: Arc::clone(&self.sender),
            peers: Arc::clone(&self.peers),
        }
    }
}

impl<B: Block> Running<B> {
    fn is_running(&self) -> bool {
        self.bft.is_running()
    }

    fn stop(&self) {
        self.bft.stop();
        self.pool.stop();
        self.fetcher.stop();
    }

    /// Add a block of the next height, moving the pool there first if the
    /// state handler has not done so yet.
    async fn pool_block(&self, block: B) -> NodeResult<()> {
        let next = self.chain.current_block().number() + 1;
        if block.number() == next {
            self.pool.new_height(next).await;
        }
        self.pool.add_block(block).await?;
        Ok(())
    }

    async fn find_block(&self, hash: &Hash) -> Option<B> {
        match self.pool.get_block_by_hash(hash).await {
            Some(block) => Some(block),
            None => self.bft.get_proposal_block(*hash).await,
        }
    }

    async fn answer_fetch(self, from: Address, req: FetchBlockReqMsg) {
        let Some(block) = self.find_block(&req.block_hash).await else {
            debug!(from = %from, block = %hash_hex(&req.block_hash), "Fetch request for unknown block");
            return;
        };
        let resp = FetchBlockRespMsg {
            msg_id: req.msg_id,
            block: Some(block),
        };
        if let Err(e) = self.peers.send_to(from, ConsensusMessage::FetchResp(resp)).await {
            warn!(to = %from, msg_id = req.msg_id, error = %e, "Fetch response not sent");
        }
    }

    /// Pull an announced block when the pool has nothing to propose.
    async fn on_sync_block(self, from: Address, block_hash: Hash) {
        if !matches!(self.pool.is_empty().await, Ok(true)) {
            trace!(block = %hash_hex(&block_hash), "Pool not empty, sync block ignored");
            return;
        }
        if self.find_block(&block_hash).await.is_some() {
            return;
        }
        let Some(block) = self.fetcher.fetch_block(from, block_hash).await else {
            return;
        };
        match self.pool_block(block).await {
            Ok(()) => debug!(from = %from, block = %hash_hex(&block_hash), "Synced block pooled"),
            Err(e) => debug!(block = %hash_hex(&block_hash), error = %e, "Synced block not pooled"),
        }
    }

    /// Resend this node's NewRound messages from the requested round up to
    /// the current one.
    async fn answer_round_request(self, from: Address, req: ReqRoundMsg) {
        let Ok(state) = self.bft.round_state().await else {
            return;
        };
        if req.height != state.height || req.round > state.round {
            debug!(
                from = %from,
                height = req.height,
                round = req.round,
                current_round = state.round,
                "Round request outside the current height"
            );
            return;
        }
        for round in req.round..=state.round {
            let Some(msg) = self.bft.get_round_msg(req.height, round).await else {
                continue;
            };
            if let Err(e) = self.peers.send_to(from, ConsensusMessage::NewRound(msg)).await {
                warn!(to = %from, round, error = %e, "NewRound resend failed");
                return;
            }
        }
    }
}

/// Feed round messages to the state handler in arrival order.
async fn forward_round_messages<B: Block>(
    bft: BftHandle<B>,
    mut inbound: mpsc::Receiver<ConsensusMessage<B>>,
) {
    while let Some(msg) = inbound.recv().await {
        match msg {
            ConsensusMessage::NewRound(m) => bft.new_round(m).await,
            ConsensusMessage::Proposal(p) => bft.new_proposal(p).await,
            ConsensusMessage::PreVote(v) => bft.pre_vote(v).await,
            ConsensusMessage::Vote(v) => bft.vote(v).await,
            other => trace!(code = ?other.code(), "Not a round message"),
        }
        if !bft.is_running() {
            break;
        }
    }
}
