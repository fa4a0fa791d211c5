//! # BFT State Machine
//!
//! Round-based Byzantine fault tolerant consensus among a rotating set of
//! verifiers. Each height cycles through rounds until more than two thirds
//! of the verifiers precommit the same block.
//!
//! ## Steps
//!
//! ```text
//!                 pool not empty        > 2/3 NewRound at round
//!   NewHeight ───────────────────▶ NewRound ──────────────────▶ Propose
//!                                     ▲                           │ proposal + block
//!                                     │ timeout: round + 1        ▼
//!                                     ├──────────────────────── PreVote
//!                                     │                           │ > 2/3 PreVote, lock
//!                                     │                           ▼
//!                                     └──────────────────────── PreCommit
//!                                                                 │ > 2/3 Vote
//!                                                                 ▼
//!                                                      chain.save_block(block, commits)
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   BftHandle ──(BftEvent, bounded mpsc)──▶ StateHandler loop ──▶ MsgSender
//!                                              │  owns BftState       ChainReader
//!   TimeoutTicker ──(BftEvent::Timeout)────────┤                      BlockPoolGateway
//!        ▲                                     │                      FetcherGateway
//!        └──────────(schedule_timeout)─────────┘
//! ```
//!
//! Every input goes through one queue, so lock and tally updates never
//! interleave. The node's own NewRound, Proposal and votes are applied
//! through a local queue before the next external event.
//!
//! ## Safety rules
//!
//! - A proposal is accepted only from `verifiers[round mod n]`, once per round.
//! - At most one PreVote and one Vote per `(round, verifier)`.
//! - A lock is released only when a round at or above the current one, and
//!   above the locked round, shows more than two thirds of prevotes.
//! - A node never precommits without a lock.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod testing;

pub use config::{BftConfig, TimeoutConfig};
pub use domain::{
    BftError, BftResult, BftState, CommitDecision, RoundState, RoundStep, TimeoutInfo,
};
pub use ports::{BlockPoolGateway, ChainReader, FetcherGateway, MsgSender, Validator};
pub use service::{BftDependencies, BftHandle, StateHandler};
