//! # Error Types
//!
//! Errors raised by the chain collaborators the node core calls into.

use thiserror::Error;

/// Errors returned by the chain reader and account state lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The block is already stored. Callers committing a block treat this as success.
    #[error("already have this block")]
    AlreadyHaveThisBlock,

    /// The commit votes of a stored height could not be loaded.
    #[error("cannot load seen commit at height {height}")]
    CannotLoadSeenCommit { height: u64 },

    /// The account does not exist on chain.
    #[error("account not exist")]
    AccountNotExist,

    /// Any other storage or state failure.
    #[error("chain error: {0}")]
    Other(String),
}

/// Result type for chain collaborator calls.
pub type ChainResult<T> = Result<T, ChainError>;
