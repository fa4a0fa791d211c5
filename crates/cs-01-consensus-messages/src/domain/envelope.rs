//! Sum type over every message the consensus core exchanges.

use super::{
    FetchBlockReqMsg, FetchBlockRespMsg, NewRoundMsg, Proposal, ReqRoundMsg, SyncBlockMsg, VoteMsg,
};
use serde::{Deserialize, Serialize};
use shared_types::MsgCode;

/// A consensus-layer message as handed to or received from the P2P layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMessage<B> {
    NewRound(NewRoundMsg),
    Proposal(Proposal),
    PreVote(VoteMsg),
    Vote(VoteMsg),
    FetchReq(FetchBlockReqMsg),
    FetchResp(FetchBlockRespMsg<B>),
    SyncBlock(SyncBlockMsg),
    ReqNewRound(ReqRoundMsg),
}

impl<B> ConsensusMessage<B> {
    /// Wire code the P2P dispatcher routes on.
    pub fn code(&self) -> MsgCode {
        match self {
            Self::NewRound(_) => MsgCode::NewRound,
            Self::Proposal(_) => MsgCode::Proposal,
            Self::PreVote(_) => MsgCode::PreVote,
            Self::Vote(_) => MsgCode::Vote,
            Self::FetchReq(_) => MsgCode::FetchReq,
            Self::FetchResp(_) => MsgCode::FetchResp,
            Self::SyncBlock(_) => MsgCode::SyncBlock,
            Self::ReqNewRound(_) => MsgCode::ReqNewRound,
        }
    }

    /// Height the message refers to, for round-level messages.
    pub fn height(&self) -> Option<u64> {
        match self {
            Self::NewRound(m) => Some(m.height),
            Self::Proposal(m) => Some(m.height),
            Self::PreVote(m) | Self::Vote(m) => Some(m.height),
            Self::ReqNewRound(m) => Some(m.height),
            Self::FetchReq(_) | Self::FetchResp(_) | Self::SyncBlock(_) => None,
        }
    }
}
