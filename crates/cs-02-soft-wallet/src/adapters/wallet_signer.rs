//! Consensus message signer backed by one wallet account.

use crate::domain::{Account, WalletError};
use crate::ports::Signer;
use crate::service::SoftWallet;
use cs_01_consensus_messages::{MsgSigner, SignError};
use shared_types::{Address, Hash, Signature};
use std::sync::Arc;

/// Signs consensus messages with a fixed account of an open [`SoftWallet`].
#[derive(Debug, Clone)]
pub struct WalletSigner {
    wallet: Arc<SoftWallet>,
    account: Account,
}

impl WalletSigner {
    pub fn new(wallet: Arc<SoftWallet>, account: Account) -> Self {
        Self { wallet, account }
    }

    /// Signer for the wallet's first account.
    pub fn main_account(wallet: Arc<SoftWallet>) -> Result<Self, WalletError> {
        let account = wallet
            .accounts()?
            .first()
            .copied()
            .ok_or(WalletError::InvalidAddress)?;
        Ok(Self::new(wallet, account))
    }

    pub fn account(&self) -> Account {
        self.account
    }
}

impl MsgSigner for WalletSigner {
    fn sign_hash(&self, hash: &Hash) -> Result<Signature, SignError> {
        self.wallet
            .sign_hash(&self.account, hash)
            .map_err(|e| match e {
                WalletError::WalletNotOpen => SignError::Unavailable(e.to_string()),
                WalletError::InvalidAddress => SignError::UnknownAccount(self.account.address),
                other => SignError::Failed(other.to_string()),
            })
    }

    fn address(&self) -> Address {
        self.account.address
    }
}
