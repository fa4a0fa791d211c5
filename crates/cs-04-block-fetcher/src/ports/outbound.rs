//! Driven ports

use async_trait::async_trait;
use cs_01_consensus_messages::FetchBlockReqMsg;
use shared_types::{Address, MsgCode};

/// Point-to-point transport for fetch requests.
#[async_trait]
pub trait FetcherConn: Send + Sync {
    async fn send_fetch_block(
        &self,
        code: MsgCode,
        to: Address,
        req: FetchBlockReqMsg,
    ) -> Result<(), String>;
}
