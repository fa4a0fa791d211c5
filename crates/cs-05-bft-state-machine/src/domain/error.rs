//! Error types for the BFT state machine

use cs_01_consensus_messages::MessageError;
use shared_types::ChainError;

/// State machine errors.
///
/// `Message` failures are protocol-level: the handler logs them and drops
/// the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BftError {
    #[error("no verifiers for height {0}")]
    NoVerifiers(u64),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("state handler is not running")]
    HandlerStopped,
}

/// Result type for state machine operations
pub type BftResult<T> = Result<T, BftError>;
