//! Block fetch, block sync and round request messages.
//!
//! These carry no witness: they are point-to-point requests whose answers
//! are themselves validated (fetched blocks are checked by hash, round
//! replies are signed NewRound messages).

use serde::{Deserialize, Serialize};
use shared_types::Hash;

/// Ask a peer for the block with `block_hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchBlockReqMsg {
    pub msg_id: u64,
    pub block_hash: Hash,
}

/// Answer to a [`FetchBlockReqMsg`] echoing its `msg_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchBlockRespMsg<B> {
    pub msg_id: u64,
    pub block: Option<B>,
}

/// Announces a block waiting for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBlockMsg {
    pub block_hash: Hash,
}

/// Ask a verifier to resend its NewRound messages from `round` at `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqRoundMsg {
    pub height: u64,
    pub round: u64,
}
