//! State machine configuration.

use std::time::Duration;

/// Step timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// How long to wait for NewRound messages before requesting them.
    pub wait_new_round: Duration,
    pub proposal: Duration,
    pub pre_vote: Duration,
    pub pre_commit: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            wait_new_round: Duration::from_secs(2),
            proposal: Duration::from_secs(3),
            pre_vote: Duration::from_secs(3),
            pre_commit: Duration::from_secs(3),
        }
    }
}

impl TimeoutConfig {
    pub fn for_testing() -> Self {
        let step = Duration::from_millis(200);
        Self {
            wait_new_round: step,
            proposal: step,
            pre_vote: step,
            pre_commit: step,
        }
    }
}

/// BFT state machine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BftConfig {
    pub timeouts: TimeoutConfig,
    /// Proposals more than this many rounds ahead are rejected.
    pub max_proposal_round_ahead: u64,
    /// Capacity of the state handler's event queue.
    pub channel_capacity: usize,
}

impl Default for BftConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            max_proposal_round_ahead: 10,
            channel_capacity: 5,
        }
    }
}

impl BftConfig {
    /// Short timeouts for tests and devnets.
    pub fn for_testing() -> Self {
        Self {
            timeouts: TimeoutConfig::for_testing(),
            ..Self::default()
        }
    }
}
