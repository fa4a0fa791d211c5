use crate::ports::FetcherGateway;
use async_trait::async_trait;
use cs_04_block_fetcher::FetcherHandle;
use shared_types::{Address, Block, Hash};

#[async_trait]
impl<B: Block> FetcherGateway<B> for FetcherHandle<B> {
    async fn fetch_block(&self, from: Address, hash: Hash) -> Option<B> {
        FetcherHandle::fetch_block(self, from, hash).await
    }
}
