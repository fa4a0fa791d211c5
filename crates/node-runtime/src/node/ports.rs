//! Driven ports of the node runtime

use async_trait::async_trait;
use cs_01_consensus_messages::ConsensusMessage;
use shared_types::{Address, Block};

/// Point-to-point replies: fetch responses and resent NewRound messages.
#[async_trait]
pub trait PeerSender<B: Block>: Send + Sync {
    async fn send_to(&self, to: Address, msg: ConsensusMessage<B>) -> Result<(), String>;
}
