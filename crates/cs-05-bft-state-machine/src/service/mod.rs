//! State handler actor, its handle and the timeout ticker.

mod handler;
mod ticker;


pub use handler::StateHandler;

use crate::domain::{BftError, BftResult, RoundState, TimeoutInfo};
use crate::ports::{BlockPoolGateway, ChainReader, FetcherGateway, MsgSender, Validator};
use cs_01_consensus_messages::{MsgSigner, NewRoundMsg, Proposal, VoteMsg};
use shared_types::{Block, Hash};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

/// Everything the state handler talks to.
pub struct BftDependencies<B: Block> {
    pub chain: Arc<dyn ChainReader<B>>,
    pub validator: Arc<dyn Validator<B>>,
    pub sender: Arc<dyn MsgSender<B>>,
    pub signer: Arc<dyn MsgSigner>,
    pub pool: Arc<dyn BlockPoolGateway<B>>,
    pub fetcher: Arc<dyn FetcherGateway<B>>,
}

impl<B: Block> Clone for BftDependencies<B> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
            validator: Arc::clone(&self.validator),
            sender: Arc::clone(&self.sender),
            signer: Arc::clone(&self.signer),
            pool: Arc::clone(&self.pool),
            fetcher: Arc::clone(&self.fetcher),
        }
    }
}

/// Every input of the state machine. One queue, handled in order.
pub(crate) enum BftEvent<B> {
    NewHeight(u64),
    NewRound(NewRoundMsg),
    BlockPoolNotEmpty,
    Proposal(Proposal),
    PreVote(VoteMsg),
    Vote(VoteMsg),
    Timeout(TimeoutInfo),
    /// The node's own proposal with the block it carries.
    OwnProposal {
        proposal: Proposal,
        block: B,
    },
    GetProposalBlock {
        hash: Hash,
        reply: oneshot::Sender<Option<B>>,
    },
    GetRoundMsg {
        height: u64,
        round: u64,
        reply: oneshot::Sender<Option<NewRoundMsg>>,
    },
    RoundState {
        reply: oneshot::Sender<RoundState<B>>,
    },
}

/// Cloneable handle to a running [`StateHandler`].
pub struct BftHandle<B> {
    events: mpsc::Sender<BftEvent<B>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<B> Clone for BftHandle<B> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<B: Block> BftHandle<B> {
    pub(crate) fn events(&self) -> &mpsc::Sender<BftEvent<B>> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow() && !self.events.is_closed()
    }

    /// Stop the handler and its ticker.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// The chain reached `height - 1`; start consensus on `height`.
    pub async fn new_height(&self, height: u64) {
        self.notify(BftEvent::NewHeight(height)).await;
    }

    pub async fn new_round(&self, msg: NewRoundMsg) {
        self.notify(BftEvent::NewRound(msg)).await;
    }

    pub async fn block_pool_not_empty(&self) {
        self.notify(BftEvent::BlockPoolNotEmpty).await;
    }

    pub async fn new_proposal(&self, proposal: Proposal) {
        self.notify(BftEvent::Proposal(proposal)).await;
    }

    pub async fn pre_vote(&self, pre_vote: VoteMsg) {
        self.notify(BftEvent::PreVote(pre_vote)).await;
    }

    pub async fn vote(&self, vote: VoteMsg) {
        self.notify(BftEvent::Vote(vote)).await;
    }

    /// A proposal block of the current height, by hash.
    pub async fn get_proposal_block(&self, hash: Hash) -> Option<B> {
        let (reply, rx) = oneshot::channel();
        self.send(BftEvent::GetProposalBlock { hash, reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// A freshly signed NewRound for `round` if it is not ahead of the
    /// current round at `height`.
    pub async fn get_round_msg(&self, height: u64, round: u64) -> Option<NewRoundMsg> {
        let (reply, rx) = oneshot::channel();
        self.send(BftEvent::GetRoundMsg {
            height,
            round,
            reply,
        })
        .await
        .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn round_state(&self) -> BftResult<RoundState<B>> {
        let (reply, rx) = oneshot::channel();
        self.send(BftEvent::RoundState { reply }).await?;
        rx.await.map_err(|_| BftError::HandlerStopped)
    }

    async fn notify(&self, event: BftEvent<B>) {
        if self.send(event).await.is_err() {
            debug!("Event for stopped state handler");
        }
    }

    async fn send(&self, event: BftEvent<B>) -> BftResult<()> {
        if *self.shutdown.borrow() {
            return Err(BftError::HandlerStopped);
        }
        self.events
            .send(event)
            .await
            .map_err(|_| BftError::HandlerStopped)
    }
}
