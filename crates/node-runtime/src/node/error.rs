use cs_03_block_pool::PoolError;
use thiserror::Error;

/// Errors of the node-level operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The consensus subsystems are not running on this node.
    #[error("consensus is not running on this node")]
    NotRunning,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type NodeResult<T> = Result<T, NodeError>;
