//! In-memory ledger shared by a devnet.
//!
//! ```text
//! StateHandler ──save_block──▶ InMemoryChain ──head height (watch)──▶ node runtimes
//!                                   │
//!                                   └── verifier committee per epoch
//! ```
//!
//! Heights `[k * period, (k + 1) * period)` form epoch `k`. The last block
//! of an epoch is a change point: the height after it is run by the next
//! epoch's committee. Epoch `k` is run by the first `committee_size`
//! candidates after rotating the candidate list left by `k`.

use super::DevBlock;
use async_trait::async_trait;
use cs_01_consensus_messages::VoteMsg;
use cs_02_soft_wallet::AddressInfoReader;
use cs_05_bft_state_machine::{ChainReader, Validator};
use parking_lot::RwLock;
use shared_types::{hash_hex, Address, Block, ChainError, ChainResult, U256};
use std::collections::HashMap;
use tokio::sync::watch;
use tracing::{info, warn};

/// Stake credited to every registered verifier.
const VERIFIER_STAKE: u64 = 1_000_000;

struct Ledger {
    blocks: Vec<DevBlock>,
    seen_commits: HashMap<u64, Vec<VoteMsg>>,
}

/// Append-only chain with per-epoch verifier sets.
pub struct InMemoryChain {
    period: u64,
    candidates: Vec<Address>,
    committee_size: usize,
    ledger: RwLock<Ledger>,
    head_tx: watch::Sender<u64>,
}

impl InMemoryChain {
    /// Chain holding only `genesis` whose committees are drawn from
    /// `candidates`.
    pub fn new(
        genesis: DevBlock,
        candidates: Vec<Address>,
        committee_size: usize,
        period: u64,
    ) -> Self {
        let (head_tx, _) = watch::channel(genesis.number);
        Self {
            period: period.max(1),
            committee_size: committee_size.min(candidates.len()),
            candidates,
            ledger: RwLock::new(Ledger {
                blocks: vec![genesis],
                seen_commits: HashMap::new(),
            }),
            head_tx,
        }
    }

    /// Head height, updated after every saved block.
    pub fn subscribe_heights(&self) -> watch::Receiver<u64> {
        self.head_tx.subscribe()
    }

    pub fn height(&self) -> u64 {
        *self.head_tx.borrow()
    }

    pub fn block_at(&self, number: u64) -> Option<DevBlock> {
        let ledger = self.ledger.read();
        let first = ledger.blocks.first()?.number;
        let index = usize::try_from(number.checked_sub(first)?).ok()?;
        ledger.blocks.get(index).cloned()
    }

    /// Verifier set running `height`.
    pub fn verifiers_at(&self, height: u64) -> Vec<Address> {
        self.verifiers_of_epoch(height / self.period)
    }

    fn verifiers_of_epoch(&self, epoch: u64) -> Vec<Address> {
        let mut set = self.candidates.clone();
        if !set.is_empty() {
            let shift = (epoch % set.len() as u64) as usize;
            set.rotate_left(shift);
        }
        set.truncate(self.committee_size);
        set
    }

    fn head(ledger: &Ledger) -> Option<&DevBlock> {
        ledger.blocks.last()
    }
}

impl ChainReader<DevBlock> for InMemoryChain {
    fn current_block(&self) -> DevBlock {
        let ledger = self.ledger.read();
        Self::head(&ledger).cloned().unwrap_or_else(DevBlock::genesis)
    }

    fn get_seen_commit(&self, height: u64) -> Vec<VoteMsg> {
        self.ledger
            .read()
            .seen_commits
            .get(&height)
            .cloned()
            .unwrap_or_default()
    }

    fn save_block(&self, block: DevBlock, commits: Vec<VoteMsg>) -> ChainResult<()> {
        let number = block.number;
        {
            let mut ledger = self.ledger.write();
            let head = Self::head(&ledger)
                .cloned()
                .ok_or_else(|| ChainError::Other("empty chain".to_string()))?;

            if number <= head.number {
                let stored = ledger
                    .blocks
                    .iter()
                    .find(|b| b.number == number)
                    .map(DevBlock::hash);
                return match stored {
                    Some(hash) if hash == block.hash() => Err(ChainError::AlreadyHaveThisBlock),
                    _ => {
                        warn!(height = number, block = %hash_hex(&block.hash()), "Conflicting block for stored height");
                        Err(ChainError::Other(format!("conflicting block at height {number}")))
                    }
                };
            }
            if number != head.number + 1 || block.parent_hash != head.hash() {
                return Err(ChainError::Other(format!(
                    "block {number} does not extend head {}",
                    head.number
                )));
            }

            ledger.seen_commits.insert(number, commits);
            ledger.blocks.push(block.clone());
        }

        info!(
            height = number,
            block = %hash_hex(&block.hash()),
            producer = %block.producer,
            "Block saved"
        );
        self.head_tx.send_replace(number);
        Ok(())
    }

    fn is_change_point(&self, block: &DevBlock, _packaging: bool) -> bool {
        (block.number + 1) % self.period == 0
    }

    fn get_curr_verifiers(&self) -> Vec<Address> {
        self.verifiers_of_epoch(self.height() / self.period)
    }

    fn get_next_verifiers(&self) -> Vec<Address> {
        self.verifiers_of_epoch(self.height() / self.period + 1)
    }
}

impl Validator<DevBlock> for InMemoryChain {
    fn full_valid(&self, block: &DevBlock) -> Result<(), String> {
        if !block.verify_hash() {
            return Err("block hash does not match header".to_string());
        }
        let head = self.current_block();
        if block.number != head.number + 1 {
            return Err(format!(
                "block height {} does not follow head {}",
                block.number, head.number
            ));
        }
        if block.parent_hash != head.hash() {
            return Err("block parent is not the chain head".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl AddressInfoReader for InMemoryChain {
    async fn current_balance(&self, address: &Address) -> U256 {
        if self.candidates.contains(address) {
            U256::from(VERIFIER_STAKE)
        } else {
            U256::zero()
        }
    }

    /// Candidate accounts exist from genesis; their nonce counts produced blocks.
    async fn get_transaction_nonce(&self, address: &Address) -> ChainResult<u64> {
        if !self.candidates.contains(address) {
            return Err(ChainError::AccountNotExist);
        }
        let ledger = self.ledger.read();
        Ok(ledger
            .blocks
            .iter()
            .filter(|b| &b.producer == address)
            .count() as u64)
    }
}
