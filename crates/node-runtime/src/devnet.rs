//! # Local Devnet
//!
//! A cluster of [`CsBftNode`]s in one process, sharing an [`InMemoryChain`]
//! and talking over an [`InMemoryNetwork`].
//!
//! ```text
//!            ┌──────────── InMemoryChain (head height watch) ────────────┐
//!            │                       │                                   │
//!      block producer          chain follower (per node)          WalletManager
//!   candidate for head + 1     on_chain_head()                    nonce refresh
//!            │                       │
//!            ▼                       ▼
//!   CsBftNode::on_new_wait_verify_block     CsBftNode ◀── dispatcher ◀── inbox
//! ```
//!
//! Candidates come from a different node at every height. A height that sees
//! no decision within `produce_retry` gets a fresh candidate from the next
//! node, so a silent producer does not stall the devnet.

use crate::adapters::{DevBlock, Envelope, InMemoryChain, InMemoryNetwork};
use crate::container::NodeConfig;
use crate::node::{CsBftNode, NodeDependencies};
use anyhow::{Context, Result};
use cs_01_consensus_messages::{unix_millis, MsgSigner};
use cs_02_soft_wallet::domain::DEFAULT_WALLET_NAME;
use cs_02_soft_wallet::{SoftWallet, WalletError, WalletManager, WalletSigner};
use cs_05_bft_state_machine::ChainReader;
use parking_lot::Mutex;
use shared_types::Address;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type DevNode = Arc<CsBftNode<DevBlock>>;

/// A running or ready-to-run local cluster.
pub struct Devnet {
    config: NodeConfig,
    chain: Arc<InMemoryChain>,
    network: Arc<InMemoryNetwork<DevBlock>>,
    nodes: Vec<DevNode>,
    inboxes: Mutex<Vec<mpsc::UnboundedReceiver<Envelope<DevBlock>>>>,
    wallets: Option<Arc<WalletManager>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Devnet {
    /// Devnet whose nodes sign with `signers`, in candidate order.
    pub fn with_signers(config: NodeConfig, signers: Vec<Arc<dyn MsgSigner>>) -> Self {
        let candidates: Vec<Address> = signers.iter().map(|s| s.address()).collect();
        let chain = Arc::new(InMemoryChain::new(
            DevBlock::genesis(),
            candidates,
            config.verifier_number,
            config.change_point_period,
        ));
        let network = InMemoryNetwork::new();

        let mut nodes = Vec::with_capacity(signers.len());
        let mut inboxes = Vec::with_capacity(signers.len());
        for signer in signers {
            let (endpoint, inbox) = network.join(signer.address());
            let deps = NodeDependencies {
                chain: chain.clone(),
                validator: chain.clone(),
                sender: endpoint.clone(),
                conn: endpoint.clone(),
                peers: endpoint,
                signer,
            };
            nodes.push(Arc::new(CsBftNode::new(config.clone(), deps)));
            inboxes.push(inbox);
        }

        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            chain,
            network,
            nodes,
            inboxes: Mutex::new(inboxes),
            wallets: None,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Devnet of `config.devnet.nodes` nodes, each signing with the main
    /// account of its own wallet under the wallet home directory. Existing
    /// wallet files are opened, missing ones are created.
    pub fn with_wallets(config: NodeConfig) -> Result<Self> {
        let mut wallets = Vec::with_capacity(config.devnet.nodes);
        let mut signers: Vec<Arc<dyn MsgSigner>> = Vec::with_capacity(config.devnet.nodes);
        for index in 0..config.devnet.nodes {
            let wallet = Arc::new(SoftWallet::new(config.wallet.clone()));
            let path = wallet_path(&config, index);
            open_or_establish(&wallet, &path, &config.devnet.wallet_password)
                .with_context(|| format!("wallet of node {index} at {}", path.display()))?;
            let signer = WalletSigner::main_account(Arc::clone(&wallet))
                .with_context(|| format!("main account of node {index}"))?;
            info!(node = index, address = %signer.address(), "Devnet signer ready");
            signers.push(Arc::new(signer));
            wallets.push(wallet);
        }

        let mut devnet = Self::with_signers(config, signers);
        let manager = WalletManager::new(
            devnet.config.wallet_manager.clone(),
            devnet.chain.clone(),
            wallets,
        )
        .context("register devnet wallets")?;
        devnet.wallets = Some(Arc::new(manager));
        Ok(devnet)
    }

    pub fn chain(&self) -> &Arc<InMemoryChain> {
        &self.chain
    }

    pub fn network(&self) -> &Arc<InMemoryNetwork<DevBlock>> {
        &self.network
    }

    pub fn nodes(&self) -> &[DevNode] {
        &self.nodes
    }

    pub fn wallets(&self) -> Option<&Arc<WalletManager>> {
        self.wallets.as_ref()
    }

    /// Start consensus on every eligible node and spawn the dispatchers,
    /// chain followers and block producer. Calling it twice is a no-op.
    pub fn start(&self) {
        let inboxes: Vec<_> = std::mem::take(&mut *self.inboxes.lock());
        if inboxes.is_empty() {
            debug!("Devnet already started");
            return;
        }
        let _ = self.shutdown.send(false);

        let mut tasks = self.tasks.lock();
        for (node, inbox) in self.nodes.iter().zip(inboxes) {
            node.start();
            tasks.push(tokio::spawn(dispatch(
                Arc::clone(node),
                inbox,
                self.shutdown.subscribe(),
            )));
            tasks.push(tokio::spawn(follow_chain(
                Arc::clone(node),
                self.chain.subscribe_heights(),
                self.shutdown.subscribe(),
            )));
        }
        tasks.push(tokio::spawn(produce_blocks(
            Arc::clone(&self.chain),
            self.nodes.clone(),
            self.config.devnet.produce_retry,
            self.shutdown.subscribe(),
        )));

        if let Some(wallets) = &self.wallets {
            wallets.start();
        }
        info!(
            nodes = self.nodes.len(),
            verifiers = self.chain.get_curr_verifiers().len(),
            "Devnet started"
        );
    }

    /// Stop every task and node. Wallets are closed, which re-encrypts them
    /// to their files.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        for node in &self.nodes {
            node.stop();
        }
        if let Some(wallets) = &self.wallets {
            wallets.stop();
        }
        info!(height = self.chain.height(), "Devnet stopped");
    }

    /// Wait until the chain reaches `height`. Returns `false` on timeout.
    pub async fn wait_for_height(&self, height: u64, timeout: Duration) -> bool {
        let mut heights = self.chain.subscribe_heights();
        let reached = async {
            loop {
                if *heights.borrow_and_update() >= height {
                    return true;
                }
                if heights.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, reached).await.unwrap_or(false)
    }
}

impl Drop for Devnet {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

fn wallet_path(config: &NodeConfig, index: usize) -> PathBuf {
    config
        .wallet
        .home_dir
        .join(".cs-bft")
        .join("devnet")
        .join(format!("node-{index}"))
        .join(DEFAULT_WALLET_NAME)
}

fn open_or_establish(wallet: &SoftWallet, path: &Path, password: &str) -> Result<()> {
    match wallet.open(path, DEFAULT_WALLET_NAME, password) {
        Ok(()) => Ok(()),
        Err(WalletError::WalletFileNotExist) => {
            wallet.establish(path, DEFAULT_WALLET_NAME, password, "")?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Deliver a node's inbox to it in arrival order.
async fn dispatch(
    node: DevNode,
    mut inbox: mpsc::UnboundedReceiver<Envelope<DevBlock>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            envelope = inbox.recv() => match envelope {
                Some(envelope) => node.on_new_p2p_msg(envelope.from, envelope.msg).await,
                None => break,
            },
        }
    }
    debug!(address = %node.address(), "Dispatcher stopped");
}

/// Tell a node about every new chain head.
async fn follow_chain(
    node: DevNode,
    mut heights: watch::Receiver<u64>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            changed = heights.changed() => {
                if changed.is_err() {
                    break;
                }
                node.on_chain_head().await;
            }
        }
    }
}

/// Hand a candidate for the next height to one running node, rotating
/// producers by height and by retry.
async fn produce_blocks(
    chain: Arc<InMemoryChain>,
    nodes: Vec<DevNode>,
    retry: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if nodes.is_empty() {
        return;
    }
    let mut heights = chain.subscribe_heights();
    let mut attempt = 0usize;
    loop {
        let head = chain.current_block();
        let running: Vec<&DevNode> = nodes.iter().filter(|n| n.is_running()).collect();
        if running.is_empty() {
            warn!(height = head.number + 1, "No running node to produce a candidate");
        } else {
            let index = (head.number as usize + 1 + attempt) % running.len();
            let producer = running[index];
            let block = DevBlock::child_of(&head, producer.address(), unix_millis());
            match producer.on_new_wait_verify_block(block).await {
                Ok(()) => debug!(height = head.number + 1, producer = %producer.address(), "Candidate produced"),
                Err(e) => debug!(height = head.number + 1, producer = %producer.address(), error = %e, "Candidate not pooled"),
            }
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            changed = heights.changed() => {
                if changed.is_err() {
                    break;
                }
                attempt = 0;
            }
            _ = tokio::time::sleep(retry) => {
                attempt += 1;
                warn!(height = head.number + 1, attempt, "No decision yet, producing another candidate");
            }
        }
    }
}
