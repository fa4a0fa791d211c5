//! Wallet manager: registry of open wallets plus the periodic nonce refresh.

use super::SoftWallet;
use crate::config::WalletManagerConfig;
use crate::domain::{Account, WalletError, WalletIdentifier, WalletResult};
use crate::ports::AddressInfoReader;
use parking_lot::{Mutex, RwLock};
use shared_types::Address;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the node's wallets and keeps their account nonces fresh.
pub struct WalletManager {
    config: WalletManagerConfig,
    reader: Arc<dyn AddressInfoReader>,
    wallets: RwLock<Vec<Arc<SoftWallet>>>,
    shutdown_tx: watch::Sender<bool>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl WalletManager {
    /// Register `wallets`; each must be open so it can be identified.
    pub fn new(
        config: WalletManagerConfig,
        reader: Arc<dyn AddressInfoReader>,
        wallets: Vec<Arc<SoftWallet>>,
    ) -> WalletResult<Self> {
        for wallet in &wallets {
            wallet.identifier()?;
        }
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            reader,
            wallets: RwLock::new(wallets),
            shutdown_tx,
            refresh_task: Mutex::new(None),
        })
    }

    /// Spawn the nonce refresh task. Idempotent.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.refresh_task.lock();
        if task.is_some() {
            return;
        }
        let _ = self.shutdown_tx.send(false);
        let manager = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.refresh_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!("Wallet nonce refresh started");
            loop {
                tokio::select! {
                    _ = interval.tick() => manager.refresh_nonces().await,
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Wallet nonce refresh stopped");
        }));
    }

    /// Stop the refresh task, close every wallet and forget them.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.refresh_task.lock().take() {
            task.abort();
        }
        let wallets = std::mem::take(&mut *self.wallets.write());
        for wallet in wallets {
            if let Err(e) = wallet.close() {
                warn!(error = %e, "Closing wallet failed");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.refresh_task.lock().is_some()
    }

    /// Add a wallet unless one with the same identifier is registered.
    pub fn add_wallet(&self, wallet: Arc<SoftWallet>) -> WalletResult<()> {
        let identifier = wallet.identifier()?;
        let mut wallets = self.wallets.write();
        if wallets
            .iter()
            .any(|w| w.identifier().ok().as_ref() == Some(&identifier))
        {
            return Ok(());
        }
        debug!(path = %identifier.path.display(), "Wallet registered");
        wallets.push(wallet);
        Ok(())
    }

    pub fn remove_wallet(&self, identifier: &WalletIdentifier) {
        self.wallets
            .write()
            .retain(|w| w.identifier().ok().as_ref() != Some(identifier));
    }

    pub fn list_identifiers(&self) -> WalletResult<Vec<WalletIdentifier>> {
        self.wallets.read().iter().map(|w| w.identifier()).collect()
    }

    pub fn find_wallet(&self, identifier: &WalletIdentifier) -> WalletResult<Arc<SoftWallet>> {
        for wallet in self.wallets.read().iter() {
            if &wallet.identifier()? == identifier {
                return Ok(Arc::clone(wallet));
            }
        }
        Err(WalletError::NotFindWallet)
    }

    pub fn find_wallet_by_address(&self, address: &Address) -> WalletResult<Arc<SoftWallet>> {
        let account = Account::new(*address);
        for wallet in self.wallets.read().iter() {
            if wallet.contains(&account)? {
                return Ok(Arc::clone(wallet));
            }
        }
        Err(WalletError::NotFindWallet)
    }

    /// First account of the first wallet.
    pub fn main_account(&self) -> WalletResult<Account> {
        if !self.is_running() {
            return Err(WalletError::WalletManagerNotRunning);
        }
        let wallet = self
            .wallets
            .read()
            .first()
            .cloned()
            .ok_or(WalletError::WalletManagerIsEmpty)?;
        wallet
            .accounts()?
            .first()
            .copied()
            .ok_or(WalletError::WalletManagerIsEmpty)
    }

    async fn refresh_nonces(&self) {
        let wallets: Vec<Arc<SoftWallet>> = self.wallets.read().clone();
        for wallet in wallets {
            if let Err(e) = wallet.padding_address_nonce(self.reader.as_ref()).await {
                debug!(error = %e, "Skipped nonce refresh");
            }
        }
    }
}

impl Drop for WalletManager {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.get_mut().take() {
            task.abort();
        }
    }
}
