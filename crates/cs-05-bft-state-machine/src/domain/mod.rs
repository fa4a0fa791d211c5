//! Domain layer for the BFT state machine
//!
//! - step: round steps and timeout keys
//! - round_set: NewRound bookkeeping and round catch-up
//! - proposal_set: proposals and their blocks per round
//! - vote_set: PreVote / PreCommit tallies
//! - state: the per-height state and its transition rules

mod error;
mod proposal_set;
mod round_set;
mod state;
mod step;
mod vote_set;

pub use error::*;
pub use proposal_set::*;
pub use round_set::*;
pub use state::*;
pub use step::*;
pub use vote_set::*;

/// Smallest count that is strictly more than two thirds of `n`.
pub(crate) fn two_thirds_majority(n: usize) -> usize {
    n * 2 / 3 + 1
}
