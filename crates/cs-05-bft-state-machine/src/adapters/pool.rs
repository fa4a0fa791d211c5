use crate::ports::BlockPoolGateway;
use async_trait::async_trait;
use cs_03_block_pool::BlockPoolHandle;
use shared_types::{Block, Hash};

#[async_trait]
impl<B: Block> BlockPoolGateway<B> for BlockPoolHandle<B> {
    async fn new_height(&self, height: u64) {
        BlockPoolHandle::new_height(self, height).await;
    }

    async fn get_block_by_hash(&self, hash: &Hash) -> Option<B> {
        BlockPoolHandle::get_block_by_hash(self, hash).await
    }

    async fn get_proposal_block(&self) -> Option<B> {
        BlockPoolHandle::get_proposal_block(self).await
    }
}
