//! Fetcher loop and its handle.


use crate::config::FetcherConfig;
use crate::domain::{FetchError, FetchResult, FetchTable, MsgIdGenerator};
use crate::ports::FetcherConn;
use cs_01_consensus_messages::{FetchBlockReqMsg, FetchBlockRespMsg};
use shared_types::{hash_hex, Address, Block, Hash, MsgCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type Waiter<B> = oneshot::Sender<Option<B>>;

enum FetchCommand<B> {
    Admit {
        from: Address,
        block_hash: Hash,
        waiter: Waiter<B>,
        reply: oneshot::Sender<FetchResult<u64>>,
    },
    Response {
        resp: FetchBlockRespMsg<B>,
        reply: oneshot::Sender<FetchResult<()>>,
    },
    Forget(u64),
    IsFetching {
        hash: Hash,
        reply: oneshot::Sender<bool>,
    },
    Outstanding {
        reply: oneshot::Sender<usize>,
    },
}

/// The fetcher loop. Owns the table of outstanding requests.
pub struct BlockFetcher<B> {
    table: FetchTable<Waiter<B>>,
    ids: MsgIdGenerator,
    commands: mpsc::Receiver<FetchCommand<B>>,
    shutdown: watch::Receiver<bool>,
}

impl<B: Block> BlockFetcher<B> {
    /// Spawn the fetcher loop and return its handle.
    pub fn spawn(
        config: &FetcherConfig,
        conn: Arc<dyn FetcherConn>,
    ) -> (FetcherHandle<B>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let fetcher = Self {
            table: FetchTable::new(config.max_outstanding),
            ids: MsgIdGenerator::default(),
            commands: command_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(fetcher.run());
        let handle = FetcherHandle {
            commands: command_tx,
            shutdown: Arc::new(shutdown_tx),
            conn,
            fetch_timeout: config.fetch_timeout,
        };
        (handle, task)
    }

    async fn run(mut self) {
        info!("Block fetcher started");
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
        info!(abandoned = self.table.len(), "Block fetcher stopped");
    }

    fn handle(&mut self, command: FetchCommand<B>) {
        match command {
            FetchCommand::Admit {
                from,
                block_hash,
                waiter,
                reply,
            } => {
                let pruned = self.table.prune(|w| w.is_closed());
                if pruned > 0 {
                    debug!(pruned, "Dropped abandoned fetches");
                }
                let msg_id = self.ids.next_id();
                let result = self
                    .table
                    .admit(msg_id, from, block_hash, waiter)
                    .map(|_| msg_id);
                match &result {
                    Ok(_) => debug!(msg_id, block = %hash_hex(&block_hash), from = %from, "Fetch admitted"),
                    Err(FetchError::DuplicateFetch) => {
                        info!(block = %hash_hex(&block_hash), "Block is already being fetched")
                    }
                    Err(e) => warn!(block = %hash_hex(&block_hash), error = %e, "Fetch rejected"),
                }
                let _ = reply.send(result);
            }
            FetchCommand::Response { resp, reply } => {
                let _ = reply.send(self.on_response(resp));
            }
            FetchCommand::Forget(msg_id) => {
                self.table.remove(msg_id);
            }
            FetchCommand::IsFetching { hash, reply } => {
                let _ = reply.send(self.table.is_fetching(&hash));
            }
            FetchCommand::Outstanding { reply } => {
                let _ = reply.send(self.table.len());
            }
        }
    }

    fn on_response(&mut self, resp: FetchBlockRespMsg<B>) -> FetchResult<()> {
        let Some(request) = self.table.get(resp.msg_id) else {
            debug!(msg_id = resp.msg_id, "Fetch response for unknown or expired request");
            return Err(FetchError::UnknownRequestId(resp.msg_id));
        };
        if let Some(block) = &resp.block {
            if block.hash() != request.block_hash {
                warn!(
                    msg_id = resp.msg_id,
                    expected = %hash_hex(&request.block_hash),
                    got = %hash_hex(&block.hash()),
                    "Fetch response carries the wrong block"
                );
                return Err(FetchError::UnexpectedBlock(resp.msg_id));
            }
        }
        if let Some(request) = self.table.remove(resp.msg_id) {
            if request.waiter.send(resp.block).is_err() {
                debug!(msg_id = resp.msg_id, "Fetch caller already gone");
            }
        }
        Ok(())
    }
}

/// Cloneable handle to a running [`BlockFetcher`].
pub struct FetcherHandle<B> {
    commands: mpsc::Sender<FetchCommand<B>>,
    shutdown: Arc<watch::Sender<bool>>,
    conn: Arc<dyn FetcherConn>,
    fetch_timeout: Duration,
}

impl<B> Clone for FetcherHandle<B> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            shutdown: Arc::clone(&self.shutdown),
            conn: Arc::clone(&self.conn),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl<B: Block> FetcherHandle<B> {
    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow() && !self.commands.is_closed()
    }

    /// Stop the loop; waiting callers get `FetcherStopped`.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Fetch `block_hash` from `from`, waiting up to the fetch timeout.
    /// Any failure yields `None`.
    pub async fn fetch_block(&self, from: Address, block_hash: Hash) -> Option<B> {
        match self.try_fetch_block(from, block_hash).await {
            Ok(block) => Some(block),
            Err(e) => {
                debug!(block = %hash_hex(&block_hash), from = %from, error = %e, "Fetch produced no block");
                None
            }
        }
    }

    /// Like [`fetch_block`](Self::fetch_block) but says why no block came.
    pub async fn try_fetch_block(&self, from: Address, block_hash: Hash) -> FetchResult<B> {
        let (waiter, response) = oneshot::channel();
        let (reply, admitted) = oneshot::channel();
        self.send(FetchCommand::Admit {
            from,
            block_hash,
            waiter,
            reply,
        })
        .await?;
        let msg_id = admitted.await.map_err(|_| FetchError::FetcherStopped)??;

        let req = FetchBlockReqMsg { msg_id, block_hash };
        if let Err(e) = self.conn.send_fetch_block(MsgCode::FetchReq, from, req).await {
            warn!(msg_id, from = %from, error = %e, "Send fetch request failed");
            self.forget(msg_id).await;
            return Err(FetchError::SendFailed(e));
        }

        match tokio::time::timeout(self.fetch_timeout, response).await {
            Ok(Ok(Some(block))) => Ok(block),
            Ok(Ok(None)) => Err(FetchError::EmptyResponse),
            Ok(Err(_)) => Err(FetchError::FetcherStopped),
            Err(_) => {
                warn!(msg_id, block = %hash_hex(&block_hash), from = %from, "Fetch block timeout");
                self.forget(msg_id).await;
                Err(FetchError::FetchTimeout)
            }
        }
    }

    /// Deliver a peer's answer to the waiting caller. Answers matching no
    /// outstanding request, or carrying another block, are dropped with an
    /// error.
    pub async fn fetch_block_resp(&self, resp: FetchBlockRespMsg<B>) -> FetchResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(FetchCommand::Response { resp, reply }).await?;
        rx.await.map_err(|_| FetchError::FetcherStopped)?
    }

    pub async fn is_fetching(&self, hash: &Hash) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .send(FetchCommand::IsFetching { hash: *hash, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Number of requests in flight.
    pub async fn outstanding(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.send(FetchCommand::Outstanding { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    async fn forget(&self, msg_id: u64) {
        let _ = self.send(FetchCommand::Forget(msg_id)).await;
    }

    async fn send(&self, command: FetchCommand<B>) -> FetchResult<()> {
        if *self.shutdown.borrow() {
            return Err(FetchError::FetcherStopped);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| FetchError::FetcherStopped)
    }
}
