//! # Fetch Flows
//!
//! The block fetcher driven over the in-memory network: answered fetches,
//! fetch timeouts against a silent peer and the outstanding cap.

#[cfg(test)]
mod tests {
    use cs_01_consensus_messages::{ConsensusMessage, FetchBlockRespMsg};
    use cs_04_block_fetcher::{BlockFetcher, FetchError, FetcherConfig, FetcherHandle};
    use node_runtime::adapters::{DevBlock, InMemoryNetwork};
    use node_runtime::PeerSender;
    use shared_types::{keccak256, Address, Block};
    use std::sync::Arc;
    use std::time::Duration;

    fn addr(byte: u8) -> Address {
        Address([byte; 22])
    }

    /// Fetcher for `me` whose responses are pumped from `me`'s inbox.
    fn fetcher_on(network: &Arc<InMemoryNetwork<DevBlock>>, me: Address) -> FetcherHandle<DevBlock> {
        let (endpoint, mut inbox) = network.join(me);
        let (fetcher, _) = BlockFetcher::spawn(&FetcherConfig::default(), endpoint);
        let pump = fetcher.clone();
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                if let ConsensusMessage::FetchResp(resp) = envelope.msg {
                    let _ = pump.fetch_block_resp(resp).await;
                }
            }
        });
        fetcher
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_answers_fetch_over_network() {
        let network = InMemoryNetwork::<DevBlock>::new();
        let fetcher = fetcher_on(&network, addr(1));

        let block = DevBlock::child_of(&DevBlock::genesis(), addr(2), 1_000);
        let (peer, mut peer_inbox) = network.join(addr(2));
        let served = block.clone();
        tokio::spawn(async move {
            while let Some(envelope) = peer_inbox.recv().await {
                if let ConsensusMessage::FetchReq(req) = envelope.msg {
                    let block = (req.block_hash == served.hash()).then(|| served.clone());
                    let resp = ConsensusMessage::FetchResp(FetchBlockRespMsg {
                        msg_id: req.msg_id,
                        block,
                    });
                    peer.send_to(envelope.from, resp).await.unwrap();
                }
            }
        });

        let fetched = fetcher.fetch_block(addr(2), block.hash()).await;
        assert_eq!(fetched, Some(block.clone()));
        assert!(!fetcher.is_fetching(&block.hash()).await);

        // Unknown hash: the peer answers without a block.
        let unknown = keccak256(b"unknown");
        assert_eq!(
            fetcher.try_fetch_block(addr(2), unknown).await,
            Err(FetchError::EmptyResponse)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_from_silent_peer_times_out() {
        let network = InMemoryNetwork::<DevBlock>::new();
        let fetcher = fetcher_on(&network, addr(1));
        let (_peer, _peer_inbox) = network.join(addr(2));
        network.set_muted(addr(2), true);

        let hash = keccak256(b"never served");
        let waiting = tokio::spawn({
            let fetcher = fetcher.clone();
            async move { fetcher.try_fetch_block(addr(2), hash).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fetcher.is_fetching(&hash).await);

        assert_eq!(waiting.await.unwrap(), Err(FetchError::FetchTimeout));
        assert!(!fetcher.is_fetching(&hash).await);
        assert_eq!(fetcher.outstanding().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outstanding_fetches_are_capped() {
        let network = InMemoryNetwork::<DevBlock>::new();
        let fetcher = fetcher_on(&network, addr(1));
        let (_peer, _peer_inbox) = network.join(addr(2));
        network.set_muted(addr(2), true);

        let cap = FetcherConfig::default().max_outstanding;
        for i in 0..cap {
            let fetcher = fetcher.clone();
            tokio::spawn(async move {
                let _ = fetcher.fetch_block(addr(2), keccak256(&[i as u8])).await;
            });
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fetcher.outstanding().await, cap);

        let rejected = fetcher
            .try_fetch_block(addr(2), keccak256(b"one too many"))
            .await;
        assert!(matches!(rejected, Err(FetchError::TooManyFetches(_))));
    }
}
