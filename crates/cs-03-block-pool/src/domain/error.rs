//! Block pool errors

use shared_types::{hash_hex, Hash};
use thiserror::Error;

/// Errors returned to callers of the pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The block is not at the pool height.
    #[error("invalid height block: pool at {expected}, block at {actual}")]
    InvalidHeightBlock { expected: u64, actual: u64 },

    /// A block with the same hash is already stored.
    #[error("duplicate block {}", hash_hex(.0))]
    DuplicateBlock(Hash),

    /// The pool loop has stopped.
    #[error("block pool not running")]
    PoolNotRunning,
}

pub type PoolResult<T> = Result<T, PoolError>;
