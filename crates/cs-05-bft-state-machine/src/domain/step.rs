//! Round steps and timeout keys.

use std::fmt;
use std::time::Duration;

/// Position inside a round. Ordered by progress within the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoundStep {
    NewHeight,
    NewRound,
    Propose,
    PreVote,
    PreCommit,
}

impl fmt::Display for RoundStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewHeight => "NewHeight",
            Self::NewRound => "NewRound",
            Self::Propose => "Propose",
            Self::PreVote => "PreVote",
            Self::PreCommit => "PreCommit",
        };
        f.write_str(name)
    }
}

/// A scheduled timeout for `(height, round, step)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutInfo {
    pub duration: Duration,
    pub height: u64,
    pub round: u64,
    pub step: RoundStep,
}

impl TimeoutInfo {
    pub fn new(duration: Duration, height: u64, round: u64, step: RoundStep) -> Self {
        Self {
            duration,
            height,
            round,
            step,
        }
    }

    /// Lexicographic ordering key; the duration does not take part.
    pub fn key(&self) -> (u64, u64, RoundStep) {
        (self.height, self.round, self.step)
    }
}
