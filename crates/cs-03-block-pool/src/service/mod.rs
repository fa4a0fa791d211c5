//! Block pool loop and its handle.


use crate::config::PoolConfig;
use crate::domain::{PoolError, PoolResult, PoolState};
use crate::ports::PoolEventNotifier;
use shared_types::{hash_hex, Block, Hash};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Height and size of the pool at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub height: u64,
    pub len: usize,
}

enum PoolCommand<B> {
    NewHeight(u64),
    AddBlock {
        block: B,
        reply: oneshot::Sender<PoolResult<()>>,
    },
    GetBlockByHash {
        hash: Hash,
        reply: oneshot::Sender<Option<B>>,
    },
    TakeProposalBlock {
        reply: oneshot::Sender<Option<B>>,
    },
    RemoveBlock(Hash),
    Status {
        reply: oneshot::Sender<PoolStatus>,
    },
}

/// The pool loop. Owns [`PoolState`]; reached only through a
/// [`BlockPoolHandle`].
pub struct BlockPool<B> {
    state: PoolState<B>,
    notifier: Arc<dyn PoolEventNotifier>,
    commands: mpsc::Receiver<PoolCommand<B>>,
    shutdown: watch::Receiver<bool>,
}

impl<B: Block> BlockPool<B> {
    /// Spawn the pool loop at `height` and return its handle.
    pub fn spawn(
        config: &PoolConfig,
        height: u64,
        notifier: Arc<dyn PoolEventNotifier>,
    ) -> (BlockPoolHandle<B>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = Self {
            state: PoolState::new(height),
            notifier,
            commands: command_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(pool.run());
        let handle = BlockPoolHandle {
            commands: command_tx,
            shutdown: Arc::new(shutdown_tx),
        };
        (handle, task)
    }

    async fn run(mut self) {
        info!(height = self.state.height(), "Block pool started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
        info!(height = self.state.height(), "Block pool stopped");
    }

    fn handle(&mut self, command: PoolCommand<B>) {
        match command {
            PoolCommand::NewHeight(h) => {
                let previous = self.state.height();
                if self.state.new_height(h) {
                    info!(previous, height = h, "Pool moved to new height");
                } else {
                    warn!(pool_height = previous, height = h, "Ignored stale pool height");
                }
            }
            PoolCommand::AddBlock { block, reply } => {
                let hash = block.hash();
                let number = block.number();
                let result = self.state.add_block(block);
                let became_non_empty = matches!(result, Ok(true));
                match &result {
                    Ok(_) => debug!(
                        block = %hash_hex(&hash),
                        height = number,
                        len = self.state.len(),
                        "Added block to pool"
                    ),
                    Err(e) => debug!(block = %hash_hex(&hash), error = %e, "Rejected pool block"),
                }
                let _ = reply.send(result.map(|_| ()));
                if became_non_empty {
                    self.notifier.block_pool_not_empty();
                }
            }
            PoolCommand::GetBlockByHash { hash, reply } => {
                let _ = reply.send(self.state.get_block_by_hash(&hash).cloned());
            }
            PoolCommand::TakeProposalBlock { reply } => {
                let block = self.state.take_proposal_block();
                if let Some(block) = &block {
                    debug!(block = %hash_hex(&block.hash()), "Took proposal block");
                }
                let _ = reply.send(block);
            }
            PoolCommand::RemoveBlock(hash) => {
                if self.state.remove_block(&hash) {
                    debug!(block = %hash_hex(&hash), "Removed pool block");
                }
            }
            PoolCommand::Status { reply } => {
                let _ = reply.send(PoolStatus {
                    height: self.state.height(),
                    len: self.state.len(),
                });
            }
        }
    }
}

/// Cloneable handle to a running [`BlockPool`].
pub struct BlockPoolHandle<B> {
    commands: mpsc::Sender<PoolCommand<B>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl<B> Clone for BlockPoolHandle<B> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<B: Block> BlockPoolHandle<B> {
    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow() && !self.commands.is_closed()
    }

    /// Stop the loop. Pending and later calls see `PoolNotRunning`.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Clear the pool and move it to height `h` if `h` is higher.
    pub async fn new_height(&self, h: u64) {
        if self.send(PoolCommand::NewHeight(h)).await.is_err() {
            warn!(height = h, "New height for stopped block pool");
        }
    }

    /// Add `block`; resolves once the loop applied it.
    pub async fn add_block(&self, block: B) -> PoolResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::AddBlock { block, reply }).await?;
        rx.await.map_err(|_| PoolError::PoolNotRunning)?
    }

    pub async fn get_block_by_hash(&self, hash: &Hash) -> Option<B> {
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::GetBlockByHash { hash: *hash, reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Remove and return the oldest block.
    pub async fn get_proposal_block(&self) -> Option<B> {
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::TakeProposalBlock { reply })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    pub async fn remove_block(&self, hash: &Hash) {
        let _ = self.send(PoolCommand::RemoveBlock(*hash)).await;
    }

    pub async fn status(&self) -> PoolResult<PoolStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(PoolCommand::Status { reply }).await?;
        rx.await.map_err(|_| PoolError::PoolNotRunning)
    }

    pub async fn is_empty(&self) -> PoolResult<bool> {
        Ok(self.status().await?.len == 0)
    }

    pub async fn len(&self) -> PoolResult<usize> {
        Ok(self.status().await?.len)
    }

    pub async fn height(&self) -> PoolResult<u64> {
        Ok(self.status().await?.height)
    }

    async fn send(&self, command: PoolCommand<B>) -> PoolResult<()> {
        if *self.shutdown.borrow() {
            return Err(PoolError::PoolNotRunning);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| PoolError::PoolNotRunning)
    }
}
