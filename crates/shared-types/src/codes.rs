//! # Message Codes
//!
//! Wire-exact codes used by peers and recognized by the P2P dispatcher.

use serde::{Deserialize, Serialize};

/// Consensus message code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum MsgCode {
    NewRound = 0x101,
    Proposal = 0x102,
    PreVote = 0x103,
    Vote = 0x104,
    FetchReq = 0x110,
    FetchResp = 0x111,
    SyncBlock = 0x112,
    ReqNewRound = 0x113,
}

impl MsgCode {
    /// Raw wire value.
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

impl TryFrom<u64> for MsgCode {
    type Error = u64;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        Ok(match code {
            0x101 => Self::NewRound,
            0x102 => Self::Proposal,
            0x103 => Self::PreVote,
            0x104 => Self::Vote,
            0x110 => Self::FetchReq,
            0x111 => Self::FetchResp,
            0x112 => Self::SyncBlock,
            0x113 => Self::ReqNewRound,
            other => return Err(other),
        })
    }
}
