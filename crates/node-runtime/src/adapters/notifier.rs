//! Pool to state handler notification bridge.
//!
//! The pool is spawned before the state handler, which needs the pool as a
//! dependency. The bridge is handed to the pool first and bound to the
//! handler once it exists.

use cs_03_block_pool::PoolEventNotifier;
use cs_05_bft_state_machine::BftHandle;
use shared_types::Block;
use std::sync::OnceLock;
use tracing::debug;

/// [`PoolEventNotifier`] forwarding to a [`BftHandle`] bound after creation.
pub struct PoolNotifierBridge<B> {
    target: OnceLock<BftHandle<B>>,
}

impl<B: Block> PoolNotifierBridge<B> {
    pub fn new() -> Self {
        Self {
            target: OnceLock::new(),
        }
    }

    /// Bind the handler. Later binds are ignored.
    pub fn bind(&self, handle: BftHandle<B>) {
        if self.target.set(handle).is_err() {
            debug!("Pool notifier already bound");
        }
    }
}

impl<B: Block> Default for PoolNotifierBridge<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Block> PoolEventNotifier for PoolNotifierBridge<B> {
    fn block_pool_not_empty(&self) {
        match self.target.get() {
            Some(handle) => PoolEventNotifier::block_pool_not_empty(handle),
            None => debug!("Pool notification before the state handler started"),
        }
    }
}
