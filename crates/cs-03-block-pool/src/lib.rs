//! # Block Pool
//!
//! Candidate blocks for the height being decided. The proposer drains its
//! proposal from here; other verifiers look up the block a proposal refers
//! to.
//!
//! ## Architecture
//!
//! ```text
//!   BlockPoolHandle ──(PoolCommand, bounded mpsc)──▶ BlockPool loop
//!        ▲                                              │ owns PoolState
//!        └──────────────(oneshot reply)─────────────────┤
//!                                                       ▼
//!                                   PoolEventNotifier::block_pool_not_empty
//! ```
//!
//! All mutations are applied by one task in enqueue order. `add_block`
//! resolves only after the loop has applied the add.
//!
//! ## Invariants
//!
//! - No two stored blocks share a hash.
//! - Every stored block has `number() == height`.
//! - The notifier fires once per empty → non-empty transition.

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::PoolConfig;
pub use domain::{PoolError, PoolResult, PoolState};
pub use ports::PoolEventNotifier;
pub use service::{BlockPool, BlockPoolHandle, PoolStatus};
