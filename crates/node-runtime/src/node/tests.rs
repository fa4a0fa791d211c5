use super::*;
use crate::adapters::{DevBlock, Envelope, InMemoryChain, InMemoryNetwork};
use cs_01_consensus_messages::{KeyPairSigner, NewRoundMsg, SignableMessage, VoteMsg};
use cs_03_block_pool::PoolError;
use cs_05_bft_state_machine::RoundStep;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

// =============================================================================
// HARNESS
// =============================================================================

/// Four candidates, committees of three, epochs of `period` blocks.
struct Cluster {
    config: NodeConfig,
    chain: Arc<InMemoryChain>,
    network: Arc<InMemoryNetwork<DevBlock>>,
    signers: Vec<KeyPairSigner>,
}

impl Cluster {
    fn new(period: u64) -> Self {
        let signers: Vec<KeyPairSigner> = (0..4).map(|_| KeyPairSigner::generate()).collect();
        let candidates = signers.iter().map(|s| s.address()).collect();
        let mut config = NodeConfig::for_testing(std::env::temp_dir());
        config.change_point_period = period;
        Self {
            chain: Arc::new(InMemoryChain::new(DevBlock::genesis(), candidates, 3, period)),
            network: InMemoryNetwork::new(),
            config,
            signers,
        }
    }

    fn address(&self, index: usize) -> Address {
        self.signers[index].address()
    }

    fn node(&self, index: usize) -> (Arc<CsBftNode<DevBlock>>, UnboundedReceiver<Envelope<DevBlock>>) {
        let (endpoint, inbox) = self.network.join(self.address(index));
        let deps = NodeDependencies {
            chain: self.chain.clone(),
            validator: self.chain.clone(),
            sender: endpoint.clone(),
            conn: endpoint.clone(),
            peers: endpoint,
            signer: Arc::new(self.signers[index].clone()),
        };
        (Arc::new(CsBftNode::new(self.config.clone(), deps)), inbox)
    }

    /// A bare network participant standing in for a remote verifier.
    fn peer(&self, index: usize) -> UnboundedReceiver<Envelope<DevBlock>> {
        self.network.join(self.address(index)).1
    }

    fn candidate(&self, producer: usize) -> DevBlock {
        DevBlock::child_of(&self.chain.current_block(), self.address(producer), 1_000)
    }

    /// Append a block with one recorded precommit at round 0.
    fn commit_next(&self) -> DevBlock {
        let block = self.candidate(0);
        let commit = VoteMsg::pre_commit(block.number, 0, block.hash());
        self.chain.save_block(block.clone(), vec![commit]).unwrap();
        block
    }
}

async fn next_matching<F>(inbox: &mut UnboundedReceiver<Envelope<DevBlock>>, mut pred: F) -> Option<Envelope<DevBlock>>
where
    F: FnMut(&Envelope<DevBlock>) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let envelope = tokio::time::timeout_at(deadline, inbox.recv()).await.ok()??;
        if pred(&envelope) {
            return Some(envelope);
        }
    }
}

async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_requires_verifier_and_is_idempotent() {
    let cluster = Cluster::new(10);
    let (outsider, _inbox) = cluster.node(3);
    let (node, _inbox) = cluster.node(0);

    assert!(!outsider.start());
    assert!(!outsider.is_running());

    assert!(node.start());
    assert!(node.start());
    assert!(node.is_running());
    assert_eq!(node.round_state().await.unwrap().height, 1);

    node.stop();
    assert!(!node.is_running());
    assert!(node.round_state().await.is_none());

    assert!(node.start());
    assert_eq!(node.round_state().await.unwrap().height, 1);
}

#[tokio::test(start_paused = true)]
async fn test_change_primary_follows_committee() {
    let cluster = Cluster::new(2);
    let (leaving, _inbox_a) = cluster.node(0);
    let (joining, _inbox_d) = cluster.node(3);
    assert!(leaving.start());
    assert!(!joining.start());

    // Block 1 closes epoch zero; epoch one runs candidates 1, 2 and 3.
    cluster.commit_next();
    leaving.on_chain_head().await;
    joining.on_chain_head().await;

    assert!(!leaving.is_running());
    assert!(joining.is_running());
    let state = joining.round_state().await.unwrap();
    assert_eq!(state.height, 2);
    assert_eq!(state.round, 0);
    assert_eq!(
        state.verifiers,
        vec![cluster.address(1), cluster.address(2), cluster.address(3)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_chain_head_moves_running_node_to_next_height() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    node.start();

    cluster.commit_next();
    node.on_chain_head().await;

    let state = node.round_state().await.unwrap();
    assert_eq!(state.height, 2);
    assert_eq!(state.round, 1);
}

#[tokio::test(start_paused = true)]
async fn test_block_pooled_before_new_height_still_opens_round() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    node.start();

    // The candidate for height 2 lands while the handler still runs height 1.
    cluster.commit_next();
    node.on_new_wait_verify_block(cluster.candidate(0)).await.unwrap();
    node.on_chain_head().await;

    assert!(
        wait_for(|| async {
            node.round_state()
                .await
                .is_some_and(|s| s.height == 2 && s.block_pool_not_empty && s.step == RoundStep::NewRound)
        })
        .await
    );
}

// =============================================================================
// WAIT-VERIFY BLOCKS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_verify_block_is_pooled_and_announced() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();

    let block = cluster.candidate(0);
    node.on_new_wait_verify_block(block.clone()).await.unwrap();
    assert_eq!(node.pool_status().await.unwrap().len, 1);

    let sync = next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::SyncBlock(_)))
        .await
        .expect("sync block announced");
    assert_eq!(sync.from, cluster.address(0));
    match sync.msg {
        ConsensusMessage::SyncBlock(msg) => assert_eq!(msg.block_hash, block.hash()),
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_verify_block_needs_running_node_and_right_height() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);

    let block = cluster.candidate(0);
    assert_eq!(
        node.on_new_wait_verify_block(block).await,
        Err(NodeError::NotRunning)
    );

    node.start();
    let far = DevBlock::new(5, [1u8; 32], cluster.address(0), 1);
    assert_eq!(
        node.on_new_wait_verify_block(far).await,
        Err(NodeError::Pool(PoolError::InvalidHeightBlock {
            expected: 1,
            actual: 5
        }))
    );
}

// =============================================================================
// P2P DISPATCH
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fetch_request_answered_from_pool() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();
    let block = cluster.candidate(0);
    node.on_new_wait_verify_block(block.clone()).await.unwrap();

    let req = FetchBlockReqMsg {
        msg_id: 7,
        block_hash: block.hash(),
    };
    node.on_new_p2p_msg(cluster.address(1), ConsensusMessage::FetchReq(req))
        .await;

    let resp = next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::FetchResp(_)))
        .await
        .expect("fetch answered");
    match resp.msg {
        ConsensusMessage::FetchResp(resp) => {
            assert_eq!(resp.msg_id, 7);
            assert_eq!(resp.block, Some(block));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_request_for_unknown_block_is_not_answered() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();

    let req = FetchBlockReqMsg {
        msg_id: 1,
        block_hash: [3u8; 32],
    };
    node.on_new_p2p_msg(cluster.address(1), ConsensusMessage::FetchReq(req))
        .await;

    assert!(
        next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::FetchResp(_)))
            .await
            .is_none()
    );
}

#[tokio::test(start_paused = true)]
async fn test_sync_block_is_fetched_into_empty_pool() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();
    let block = cluster.candidate(1);

    let sync = SyncBlockMsg {
        block_hash: block.hash(),
    };
    node.on_new_p2p_msg(cluster.address(1), ConsensusMessage::SyncBlock(sync))
        .await;

    let req = next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::FetchReq(_)))
        .await
        .expect("fetch request sent to the announcer");
    let ConsensusMessage::FetchReq(req) = req.msg else {
        unreachable!()
    };
    assert_eq!(req.block_hash, block.hash());

    let resp = FetchBlockRespMsg {
        msg_id: req.msg_id,
        block: Some(block),
    };
    node.on_new_p2p_msg(cluster.address(1), ConsensusMessage::FetchResp(resp))
        .await;

    assert!(wait_for(|| async { node.pool_status().await.map(|s| s.len) == Some(1) }).await);
}

#[tokio::test(start_paused = true)]
async fn test_sync_block_ignored_when_pool_has_blocks() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();
    node.on_new_wait_verify_block(cluster.candidate(0)).await.unwrap();

    let other = cluster.candidate(1);
    node.on_new_p2p_msg(
        cluster.address(1),
        ConsensusMessage::SyncBlock(SyncBlockMsg {
            block_hash: other.hash(),
        }),
    )
    .await;

    assert!(
        next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::FetchReq(_)))
            .await
            .is_none()
    );
}

#[tokio::test(start_paused = true)]
async fn test_round_request_resends_new_rounds_up_to_current() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();
    assert_eq!(node.round_state().await.unwrap().round, 1);

    let req = ReqRoundMsg {
        height: 1,
        round: 0,
    };
    node.on_new_p2p_msg(cluster.address(1), ConsensusMessage::ReqNewRound(req))
        .await;

    let mut rounds = Vec::new();
    while let Some(envelope) =
        next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::NewRound(_))).await
    {
        let ConsensusMessage::NewRound(msg) = envelope.msg else {
            unreachable!()
        };
        assert_eq!(msg.signer(), Some(cluster.address(0)));
        assert_eq!(msg.valid(), Ok(()));
        rounds.push(msg.round);
        if rounds.len() == 2 {
            break;
        }
    }
    assert_eq!(rounds, vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_round_request_ahead_or_other_height_is_ignored() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);
    node.start();

    for req in [
        ReqRoundMsg {
            height: 1,
            round: 5,
        },
        ReqRoundMsg {
            height: 2,
            round: 0,
        },
    ] {
        node.on_new_p2p_msg(cluster.address(1), ConsensusMessage::ReqNewRound(req))
            .await;
    }

    assert!(
        next_matching(&mut peer, |e| matches!(e.msg, ConsensusMessage::NewRound(_)))
            .await
            .is_none()
    );
}

#[tokio::test(start_paused = true)]
async fn test_round_messages_reach_state_handler() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    node.start();
    node.on_new_wait_verify_block(cluster.candidate(0)).await.unwrap();

    for index in [1, 2] {
        let msg = NewRoundMsg::new(1, 1).sign_with(&cluster.signers[index]).unwrap();
        node.on_new_p2p_msg(cluster.address(index), ConsensusMessage::NewRound(msg))
            .await;
    }

    // Round 1 belongs to candidate 1, so the node waits for its proposal.
    assert!(
        wait_for(|| async {
            node.round_state().await.map(|s| s.step) == Some(RoundStep::Propose)
        })
        .await
    );
}

#[tokio::test(start_paused = true)]
async fn test_round_message_flood_is_bounded_by_channel_capacity() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    node.start();
    let capacity = cluster.config.bft.channel_capacity;
    let queue = node.running().unwrap().round_msgs;
    assert_eq!(queue.max_capacity(), capacity);

    let total = capacity as u64 * 4;
    let flooder = {
        let node = Arc::clone(&node);
        let signer = cluster.signers[1].clone();
        let from = cluster.address(1);
        tokio::spawn(async move {
            for round in 0..total {
                let msg = NewRoundMsg::new(1, round).sign_with(&signer).unwrap();
                node.on_new_p2p_msg(from, ConsensusMessage::NewRound(msg)).await;
            }
        })
    };

    for _ in 0..200 {
        assert!(queue.max_capacity() - queue.capacity() <= capacity);
        if flooder.is_finished() {
            break;
        }
        tokio::task::yield_now().await;
    }
    tokio::time::timeout(Duration::from_secs(5), flooder)
        .await
        .expect("flood delivered")
        .unwrap();
    assert!(node.round_state().await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_messages_dropped_when_not_running() {
    let cluster = Cluster::new(10);
    let (node, _inbox) = cluster.node(0);
    let mut peer = cluster.peer(1);

    node.on_new_p2p_msg(
        cluster.address(1),
        ConsensusMessage::ReqNewRound(ReqRoundMsg {
            height: 1,
            round: 0,
        }),
    )
    .await;

    assert!(next_matching(&mut peer, |_| true).await.is_none());
}
