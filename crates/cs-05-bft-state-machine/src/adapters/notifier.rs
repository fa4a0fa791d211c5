//! Pool notifications into the state handler's queue.

use crate::service::{BftEvent, BftHandle};
use cs_03_block_pool::PoolEventNotifier;
use shared_types::Block;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

impl<B: Block> PoolEventNotifier for BftHandle<B> {
    /// Called from the pool loop, which must not wait on the handler: a full
    /// queue hands the event to a task instead.
    fn block_pool_not_empty(&self) {
        match self.events().try_send(BftEvent::BlockPoolNotEmpty) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let events = self.events().clone();
                tokio::spawn(async move {
                    let _ = events.send(event).await;
                });
            }
            Err(TrySendError::Closed(_)) => debug!("Pool notification after handler stop"),
        }
    }
}
