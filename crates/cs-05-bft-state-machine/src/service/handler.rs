//! The state handler loop.
//!
//! Owns [`BftState`] and performs the side effects of its transitions:
//! signing, broadcasting, scheduling timeouts and committing. Messages the
//! node produces itself go through a local queue that is drained before the
//! next external event, so they are applied exactly like peer messages.

use super::ticker::{TickerHandle, TimeoutTicker};
use super::{BftDependencies, BftEvent, BftHandle};
use crate::config::BftConfig;
use crate::domain::{BftResult, BftState, CommitDecision, RoundStep, TimeoutInfo};
use cs_01_consensus_messages::{
    ConsensusMessage, NewRoundMsg, Proposal, ReqRoundMsg, SignableMessage, VoteMsg,
};
use shared_types::{hash_hex, Address, Block, ChainError, Hash, MsgCode};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Consensus driver for one node.
pub struct StateHandler<B: Block> {
    config: BftConfig,
    state: BftState<B>,
    deps: BftDependencies<B>,
    ticker: TickerHandle,
    events: mpsc::Receiver<BftEvent<B>>,
    local: VecDeque<BftEvent<B>>,
    shutdown: watch::Receiver<bool>,
}

impl<B: Block> StateHandler<B> {
    /// Spawn the handler and its ticker. The handler starts on the height
    /// after the current chain head.
    pub fn spawn(config: BftConfig, deps: BftDependencies<B>) -> (BftHandle<B>, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ticker, _) = TimeoutTicker::spawn(events_tx.clone(), shutdown_rx.clone());

        let handler = Self {
            state: BftState::new(config.max_proposal_round_ahead),
            config,
            deps,
            ticker,
            events: events_rx,
            local: VecDeque::new(),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(handler.run());
        let handle = BftHandle {
            events: events_tx,
            shutdown: Arc::new(shutdown_tx),
        };
        (handle, task)
    }

    async fn run(mut self) {
        let next = self.deps.chain.current_block().number() + 1;
        info!(height = next, address = %self.deps.signer.address(), "State handler started");
        self.on_new_height(next).await;

        loop {
            while let Some(event) = self.local.pop_front() {
                self.handle(event).await;
            }
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }
        info!(
            height = self.state.height(),
            round = self.state.round(),
            "State handler stopped"
        );
    }

    async fn handle(&mut self, event: BftEvent<B>) {
        match event {
            BftEvent::NewHeight(height) => self.on_new_height(height).await,
            BftEvent::NewRound(msg) => {
                let before = self.state.position();
                let result = self.state.on_new_round(&msg);
                self.log_dropped("NewRound", result);
                self.after_transition(before).await;
            }
            BftEvent::BlockPoolNotEmpty => {
                let before = self.state.position();
                self.state.on_block_pool_not_empty();
                self.after_transition(before).await;
            }
            BftEvent::Proposal(proposal) => self.on_new_proposal(proposal).await,
            BftEvent::OwnProposal { proposal, block } => {
                let before = self.state.position();
                let result = self.state.on_new_proposal(proposal, block);
                self.log_dropped("Proposal", result);
                self.after_transition(before).await;
            }
            BftEvent::PreVote(pre_vote) => {
                let before = self.state.position();
                let result = self.state.on_pre_vote(&pre_vote);
                self.log_dropped("PreVote", result);
                self.after_transition(before).await;
            }
            BftEvent::Vote(vote) => self.on_vote(vote).await,
            BftEvent::Timeout(ti) => self.on_timeout(ti).await,
            BftEvent::GetProposalBlock { hash, reply } => {
                let _ = reply.send(self.state.block_by_hash(&hash).cloned());
            }
            BftEvent::GetRoundMsg {
                height,
                round,
                reply,
            } => {
                let _ = reply.send(self.round_msg(height, round));
            }
            BftEvent::RoundState { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
        }
    }

    // =========================================================================
    // HEIGHT
    // =========================================================================

    async fn on_new_height(&mut self, height: u64) {
        let current = self.deps.chain.current_block();
        let chain_height = current.number();
        if height != chain_height + 1 || height <= self.state.height() {
            debug!(height, chain_height, "Ignored new height");
            return;
        }

        let mut last_round = 0;
        if height > 1 {
            match self.deps.chain.get_seen_commit(chain_height).first() {
                Some(commit) => last_round = commit.round,
                None => {
                    let e = ChainError::CannotLoadSeenCommit {
                        height: chain_height,
                    };
                    error!(height, error = %e, "Cannot enter new height");
                    return;
                }
            }
        }

        self.deps.pool.new_height(height).await;

        let (verifiers, round) = if self.deps.chain.is_change_point(&current, false) {
            (self.deps.chain.get_next_verifiers(), 0)
        } else {
            (self.deps.chain.get_curr_verifiers(), last_round + 1)
        };
        let count = verifiers.len();
        match self.state.enter_new_height(height, round, verifiers) {
            Ok(()) => info!(height, round, verifiers = count, "Entered new height"),
            Err(e) => error!(height, error = %e, "Cannot enter new height"),
        }
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    async fn on_new_proposal(&mut self, proposal: Proposal) {
        if let Err(e) = self.state.valid_proposal(&proposal) {
            self.log_dropped("Proposal", Err(e));
            return;
        }
        let from = proposal.signer();
        let Some(block) = self.find_block(&proposal.block_id, from).await else {
            info!(
                round = proposal.round,
                block = %hash_hex(&proposal.block_id),
                "Proposal block unavailable"
            );
            return;
        };
        if block.is_special() {
            info!(block = %hash_hex(&proposal.block_id), "Dropped proposal of special block");
            return;
        }
        if let Err(e) = self.deps.validator.full_valid(&block) {
            info!(block = %hash_hex(&proposal.block_id), error = %e, "Dropped invalid proposal block");
            return;
        }

        let before = self.state.position();
        let result = self.state.on_new_proposal(proposal, block);
        self.log_dropped("Proposal", result);
        self.after_transition(before).await;
    }

    async fn on_vote(&mut self, vote: VoteMsg) {
        match self.state.on_vote(&vote) {
            Ok(Some(decision)) => self.commit(decision).await,
            Ok(None) => {}
            Err(e) => self.log_dropped("Vote", Err(e)),
        }
    }

    async fn commit(&mut self, decision: CommitDecision) {
        let known = self
            .state
            .block_at_round(decision.round)
            .filter(|b| b.hash() == decision.block_id)
            .or_else(|| self.state.block_by_hash(&decision.block_id))
            .cloned();
        let block = match known {
            Some(block) => Some(block),
            None => {
                let proposer = self.state.proposer_at_round(decision.round);
                self.find_block(&decision.block_id, proposer).await
            }
        };
        let Some(block) = block else {
            warn!(
                height = decision.height,
                round = decision.round,
                block = %hash_hex(&decision.block_id),
                "Decided block unavailable"
            );
            return;
        };

        match self.deps.chain.save_block(block.clone(), decision.commits) {
            Ok(()) | Err(ChainError::AlreadyHaveThisBlock) => {}
            Err(e) => {
                error!(
                    height = decision.height,
                    round = decision.round,
                    error = %e,
                    "Saving decided block failed"
                );
                return;
            }
        }
        self.state.mark_committed(decision.round);
        info!(
            height = decision.height,
            round = decision.round,
            block = %hash_hex(&decision.block_id),
            "Committed block"
        );
        if let Err(e) = self.deps.sender.broadcast_block(block).await {
            warn!(error = %e, "Block broadcast failed");
        }
    }

    // =========================================================================
    // TIMEOUTS
    // =========================================================================

    async fn on_timeout(&mut self, ti: TimeoutInfo) {
        if ti.height != self.state.height() || ti.round != self.state.round() {
            debug!(height = ti.height, round = ti.round, step = %ti.step, "Ignored old timeout");
            return;
        }
        info!(height = ti.height, round = ti.round, step = %ti.step, "Step timed out");

        let before = self.state.position();
        match ti.step {
            RoundStep::NewRound => {
                self.on_new_round_timeout().await;
                return;
            }
            RoundStep::Propose => self.state.on_propose_timeout(),
            RoundStep::PreVote => self.state.on_pre_vote_timeout(),
            RoundStep::PreCommit => self.state.on_pre_commit_timeout(),
            RoundStep::NewHeight => {
                warn!(height = ti.height, "Unexpected NewHeight timeout");
                return;
            }
        }
        self.after_transition(before).await;
    }

    async fn on_new_round_timeout(&mut self) {
        if self.state.step() != RoundStep::NewRound {
            return;
        }
        let me = self.deps.signer.address();
        let missing: Vec<Address> = self
            .state
            .new_round_req_list()
            .into_iter()
            .filter(|v| *v != me)
            .collect();
        if !missing.is_empty() {
            let req = ReqRoundMsg {
                height: self.state.height(),
                round: self.state.round(),
            };
            debug!(missing = missing.len(), round = req.round, "Requesting NewRound messages");
            if let Err(e) = self
                .deps
                .sender
                .send_req_round(MsgCode::ReqNewRound, &missing, req)
                .await
            {
                warn!(error = %e, "Round request failed");
            }
        }
        if !self.state.enough_new_round() {
            self.schedule(self.config.timeouts.wait_new_round, RoundStep::NewRound);
        }
    }

    // =========================================================================
    // STEP ENTRY ACTIONS
    // =========================================================================

    async fn after_transition(&mut self, before: (u64, RoundStep)) {
        let (round, step) = self.state.position();
        if (round, step) == before {
            return;
        }
        debug!(height = self.state.height(), round, step = %step, "Entered step");
        match step {
            RoundStep::NewHeight => {}
            RoundStep::NewRound => self.on_enter_new_round().await,
            RoundStep::Propose => self.on_enter_propose().await,
            RoundStep::PreVote => self.on_enter_pre_vote().await,
            RoundStep::PreCommit => self.on_enter_pre_commit().await,
        }
    }

    async fn on_enter_new_round(&mut self) {
        self.schedule(self.config.timeouts.wait_new_round, RoundStep::NewRound);
        if !self.is_verifier() {
            return;
        }
        let msg = NewRoundMsg::new(self.state.height(), self.state.round());
        if let Some(msg) = self.sign(msg) {
            self.broadcast(ConsensusMessage::NewRound(msg.clone())).await;
            self.local.push_back(BftEvent::NewRound(msg));
        }
    }

    async fn on_enter_propose(&mut self) {
        self.schedule(self.config.timeouts.proposal, RoundStep::Propose);
        if !self.state.is_proposer(&self.deps.signer.address()) {
            return;
        }
        let Some(block) = self.proposal_block().await else {
            info!(
                height = self.state.height(),
                round = self.state.round(),
                "No block to propose"
            );
            return;
        };
        let proposal = Proposal::new(self.state.height(), self.state.round(), block.hash());
        let Some(proposal) = self.sign(proposal) else {
            return;
        };
        info!(
            height = proposal.height,
            round = proposal.round,
            block = %hash_hex(&proposal.block_id),
            "Proposing block"
        );
        self.broadcast(ConsensusMessage::Proposal(proposal.clone()))
            .await;
        self.local.push_back(BftEvent::OwnProposal { proposal, block });
    }

    async fn on_enter_pre_vote(&mut self) {
        self.schedule(self.config.timeouts.pre_vote, RoundStep::PreVote);
        if !self.is_verifier() {
            return;
        }
        match self.state.make_prevote().and_then(|v| self.sign(v)) {
            Some(pre_vote) => {
                self.broadcast(ConsensusMessage::PreVote(pre_vote.clone()))
                    .await;
                self.local.push_back(BftEvent::PreVote(pre_vote));
            }
            None => debug!(round = self.state.round(), "No block to prevote"),
        }
    }

    async fn on_enter_pre_commit(&mut self) {
        self.schedule(self.config.timeouts.pre_commit, RoundStep::PreCommit);
        if !self.is_verifier() {
            return;
        }
        match self.state.make_vote().and_then(|v| self.sign(v)) {
            Some(vote) => {
                self.broadcast(ConsensusMessage::Vote(vote.clone())).await;
                self.local.push_back(BftEvent::Vote(vote));
            }
            None => debug!(round = self.state.round(), "No locked block to precommit"),
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// Locked block, else the first pool block that is not special and
    /// passes full validation.
    async fn proposal_block(&self) -> Option<B> {
        if let Some(locked) = self.state.locked_block() {
            return Some(locked.clone());
        }
        while let Some(block) = self.deps.pool.get_proposal_block().await {
            if block.is_special() {
                debug!(block = %hash_hex(&block.hash()), "Skipped special block");
                continue;
            }
            match self.deps.validator.full_valid(&block) {
                Ok(()) => return Some(block),
                Err(e) => warn!(block = %hash_hex(&block.hash()), error = %e, "Skipped invalid pool block"),
            }
        }
        None
    }

    /// Block set, then pool, then a fetch from `from`.
    async fn find_block(&self, hash: &Hash, from: Option<Address>) -> Option<B> {
        if let Some(block) = self.state.block_by_hash(hash) {
            return Some(block.clone());
        }
        if let Some(block) = self.deps.pool.get_block_by_hash(hash).await {
            return Some(block);
        }
        let from = from?;
        self.deps.fetcher.fetch_block(from, *hash).await
    }

    fn round_msg(&self, height: u64, round: u64) -> Option<NewRoundMsg> {
        if height != self.state.height() || round > self.state.round() || !self.is_verifier() {
            return None;
        }
        self.sign(NewRoundMsg::new(height, round))
    }

    fn is_verifier(&self) -> bool {
        self.state.is_verifier(&self.deps.signer.address())
    }

    fn schedule(&self, duration: Duration, step: RoundStep) {
        self.ticker.schedule_timeout(TimeoutInfo::new(
            duration,
            self.state.height(),
            self.state.round(),
            step,
        ));
    }

    fn sign<M: SignableMessage>(&self, msg: M) -> Option<M> {
        match msg.sign_with(self.deps.signer.as_ref()) {
            Ok(signed) => Some(signed),
            Err(e) => {
                warn!(error = %e, "Signing consensus message failed");
                None
            }
        }
    }

    async fn broadcast(&self, msg: ConsensusMessage<B>) {
        let code = msg.code();
        if let Err(e) = self.deps.sender.broadcast(code, msg).await {
            warn!(?code, error = %e, "Broadcast failed");
        }
    }

    fn log_dropped(&self, kind: &'static str, result: BftResult<()>) {
        if let Err(e) = result {
            info!(
                kind,
                height = self.state.height(),
                round = self.state.round(),
                error = %e,
                "Dropped consensus message"
            );
        }
    }
}
