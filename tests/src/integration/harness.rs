//! Shared fixtures for the integration scenarios.

use cs_01_consensus_messages::{KeyPairSigner, MsgSigner};
use cs_05_bft_state_machine::ChainReader;
use node_runtime::adapters::DevBlock;
use node_runtime::{Devnet, NodeConfig};
use shared_types::{Address, Block, Hash};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Virtual-time budget for reaching a height; generous since time is paused.
pub const HEIGHT_BUDGET: std::time::Duration = std::time::Duration::from_secs(120);

pub fn key_signers(count: usize) -> Vec<KeyPairSigner> {
    (0..count).map(|_| KeyPairSigner::generate()).collect()
}

/// Devnet signing with `keys`, in order, using the test calibration.
pub fn devnet_of(keys: &[KeyPairSigner], configure: impl FnOnce(&mut NodeConfig)) -> (Devnet, TempDir) {
    let home = tempfile::tempdir().unwrap();
    let mut config = NodeConfig::for_testing(home.path());
    configure(&mut config);
    let signers: Vec<Arc<dyn MsgSigner>> = keys
        .iter()
        .map(|k| Arc::new(k.clone()) as Arc<dyn MsgSigner>)
        .collect();
    (Devnet::with_signers(config, signers), home)
}

/// Every block any node announced, checked for one hash per height.
pub struct CommitLog {
    rx: broadcast::Receiver<(Address, DevBlock)>,
    decided: HashMap<u64, Hash>,
}

impl CommitLog {
    pub fn new(rx: broadcast::Receiver<(Address, DevBlock)>) -> Self {
        Self {
            rx,
            decided: HashMap::new(),
        }
    }

    /// Drain announcements, panicking if two nodes committed different
    /// blocks at one height.
    pub fn check(&mut self) -> &HashMap<u64, Hash> {
        loop {
            match self.rx.try_recv() {
                Ok((from, block)) => {
                    let first = *self.decided.entry(block.number()).or_insert(block.hash());
                    assert_eq!(
                        first,
                        block.hash(),
                        "{from} committed a second block at height {}",
                        block.number()
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(n)) => panic!("commit log lagged by {n}"),
            }
        }
        &self.decided
    }
}

/// Signers of the commit stored with block `height`.
pub fn commit_signers(devnet: &Devnet, height: u64) -> Vec<Address> {
    devnet
        .chain()
        .get_seen_commit(height)
        .iter()
        .filter_map(|vote| vote.voter())
        .collect()
}
