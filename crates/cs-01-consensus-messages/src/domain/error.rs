//! Error types for consensus message validation

use super::VoteType;
use shared_types::Address;

/// Protocol-level message errors.
///
/// These never travel back to the sending peer: the receiver logs them and
/// drops the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message has no witness")]
    MissingWitness,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("not a current verifier: {0}")]
    NotCurrentVerifier(Address),

    #[error("wrong height: expected {expected}, got {actual}")]
    WrongHeight { expected: u64, actual: u64 },

    #[error("duplicate vote from {voter} at round {round}")]
    DuplicateVote { voter: Address, round: u64 },

    #[error("wrong vote type: expected {expected:?}, got {actual:?}")]
    WrongVoteType { expected: VoteType, actual: VoteType },

    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Result type for message operations
pub type MessageResult<T> = Result<T, MessageError>;

/// Failure reported by a [`MsgSigner`](crate::ports::MsgSigner).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignError {
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    #[error("unknown signing account: {0}")]
    UnknownAccount(Address),

    #[error("signing failed: {0}")]
    Failed(String),
}
