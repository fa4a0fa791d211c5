//! In-process transport for a devnet.
//!
//! ```text
//!  NetworkEndpoint(A) ──broadcast / send_to──▶ InMemoryNetwork ──▶ inbox(B), inbox(C), ...
//!                     ──broadcast_block──────▶ committed block feed (broadcast)
//! ```
//!
//! Every node owns one unbounded FIFO inbox, so messages from one sender
//! arrive in the order they were sent. A muted node neither sends nor
//! receives, which stands in for a crashed or partitioned peer.

use crate::node::PeerSender;
use async_trait::async_trait;
use cs_01_consensus_messages::{ConsensusMessage, FetchBlockReqMsg, ReqRoundMsg};
use cs_04_block_fetcher::FetcherConn;
use cs_05_bft_state_machine::MsgSender;
use parking_lot::RwLock;
use shared_types::{Address, Block, MsgCode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

/// Capacity of the committed block feed.
const BLOCK_FEED_CAPACITY: usize = 256;

/// A message as seen by its receiver.
#[derive(Debug, Clone)]
pub struct Envelope<B> {
    pub from: Address,
    pub msg: ConsensusMessage<B>,
}

/// Message hub connecting the devnet's nodes.
pub struct InMemoryNetwork<B> {
    peers: RwLock<HashMap<Address, mpsc::UnboundedSender<Envelope<B>>>>,
    muted: RwLock<HashSet<Address>>,
    blocks: broadcast::Sender<(Address, B)>,
}

impl<B: Block> InMemoryNetwork<B> {
    pub fn new() -> Arc<Self> {
        let (blocks, _) = broadcast::channel(BLOCK_FEED_CAPACITY);
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
            muted: RwLock::new(HashSet::new()),
            blocks,
        })
    }

    /// Register `address`; returns its sending side and its inbox.
    pub fn join(
        self: &Arc<Self>,
        address: Address,
    ) -> (Arc<NetworkEndpoint<B>>, mpsc::UnboundedReceiver<Envelope<B>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.write().insert(address, tx);
        let endpoint = Arc::new(NetworkEndpoint {
            address,
            network: Arc::clone(self),
        });
        (endpoint, rx)
    }

    pub fn leave(&self, address: &Address) {
        self.peers.write().remove(address);
    }

    /// Cut `address` off the network, or reconnect it.
    pub fn set_muted(&self, address: Address, muted: bool) {
        let mut set = self.muted.write();
        if muted {
            set.insert(address);
        } else {
            set.remove(&address);
        }
    }

    pub fn is_muted(&self, address: &Address) -> bool {
        self.muted.read().contains(address)
    }

    /// Blocks published with `broadcast_block`, tagged with the publisher.
    pub fn subscribe_blocks(&self) -> broadcast::Receiver<(Address, B)> {
        self.blocks.subscribe()
    }

    fn deliver(&self, from: Address, to: &Address, msg: ConsensusMessage<B>) -> Result<(), String> {
        if self.is_muted(&from) || self.is_muted(to) {
            trace!(from = %from, to = %to, code = ?msg.code(), "Dropped message of muted node");
            return Ok(());
        }
        let peers = self.peers.read();
        let inbox = peers.get(to).ok_or_else(|| format!("unknown peer {to}"))?;
        inbox
            .send(Envelope { from, msg })
            .map_err(|_| format!("peer {to} stopped receiving"))
    }

    fn deliver_all(&self, from: Address, msg: ConsensusMessage<B>) {
        let targets: Vec<Address> = self
            .peers
            .read()
            .keys()
            .filter(|address| **address != from)
            .copied()
            .collect();
        for to in targets {
            if let Err(e) = self.deliver(from, &to, msg.clone()) {
                debug!(from = %from, to = %to, error = %e, "Broadcast delivery failed");
            }
        }
    }
}

/// One node's attachment to an [`InMemoryNetwork`].
pub struct NetworkEndpoint<B> {
    address: Address,
    network: Arc<InMemoryNetwork<B>>,
}

impl<B: Block> NetworkEndpoint<B> {
    pub fn address(&self) -> Address {
        self.address
    }
}

fn check_code<B>(code: MsgCode, msg: &ConsensusMessage<B>) -> Result<(), String> {
    if code == msg.code() {
        Ok(())
    } else {
        Err(format!("code {code:?} does not match {:?}", msg.code()))
    }
}

#[async_trait]
impl<B: Block> MsgSender<B> for NetworkEndpoint<B> {
    async fn broadcast(&self, code: MsgCode, msg: ConsensusMessage<B>) -> Result<(), String> {
        check_code(code, &msg)?;
        self.network.deliver_all(self.address, msg);
        Ok(())
    }

    async fn send_req_round(
        &self,
        code: MsgCode,
        to: &[Address],
        msg: ReqRoundMsg,
    ) -> Result<(), String> {
        let msg = ConsensusMessage::ReqNewRound(msg);
        check_code(code, &msg)?;
        for peer in to {
            self.network.deliver(self.address, peer, msg.clone())?;
        }
        Ok(())
    }

    async fn broadcast_block(&self, block: B) -> Result<(), String> {
        if self.network.is_muted(&self.address) {
            return Ok(());
        }
        // No subscriber is not an error.
        let _ = self.network.blocks.send((self.address, block));
        Ok(())
    }
}

#[async_trait]
impl<B: Block> FetcherConn for NetworkEndpoint<B> {
    async fn send_fetch_block(
        &self,
        code: MsgCode,
        to: Address,
        req: FetchBlockReqMsg,
    ) -> Result<(), String> {
        let msg = ConsensusMessage::FetchReq(req);
        check_code(code, &msg)?;
        self.network.deliver(self.address, &to, msg)
    }
}

#[async_trait]
impl<B: Block> PeerSender<B> for NetworkEndpoint<B> {
    async fn send_to(&self, to: Address, msg: ConsensusMessage<B>) -> Result<(), String> {
        self.network.deliver(self.address, &to, msg)
    }
}
