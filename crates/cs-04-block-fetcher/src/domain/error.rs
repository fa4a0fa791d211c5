//! Fetcher errors

use thiserror::Error;

/// Why a fetch produced no block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("fetch timed out")]
    FetchTimeout,

    #[error("too many outstanding fetches ({0})")]
    TooManyFetches(usize),

    /// A fetch for the same block is already in flight.
    #[error("block is already being fetched")]
    DuplicateFetch,

    #[error("send fetch request failed: {0}")]
    SendFailed(String),

    /// The peer answered without the block.
    #[error("peer does not have the block")]
    EmptyResponse,

    #[error("unknown fetch request id {0}")]
    UnknownRequestId(u64),

    /// The answer to request `0` carries a block other than the one asked for.
    #[error("fetch response {0} carries an unexpected block")]
    UnexpectedBlock(u64),

    #[error("fetcher stopped")]
    FetcherStopped,
}

pub type FetchResult<T> = Result<T, FetchError>;
