//! Soft wallet service
//!
//! Lifecycle (`Closed ↔ Opened`), account derivation and signing over the
//! domain keystore. All mutable state sits behind one `parking_lot::RwLock`:
//! signers take the read lock, lifecycle and derivation take the write lock.

mod manager;

#[cfg(test)]
mod tests;

pub use manager::WalletManager;

use crate::config::WalletConfig;
use crate::domain::{
    check_password, check_wallet_path, Account, DerivationPath, SymmetricKey, WalletError,
    WalletFileContent, WalletIdentifier, WalletInfo, WalletResult, WalletStatus, WalletType,
    ACCOUNT_VALUE_INDEX, DEFAULT_ACCOUNT_VALUE, DEFAULT_DERIVED_PATH_LENGTH, HARDENED_OFFSET,
    WALLET_ENTROPY_BYTES,
};
use crate::ports::{AddressInfoReader, Signer};
use bip39::Mnemonic;
use k256::ecdsa::VerifyingKey;
use parking_lot::RwLock;
use rand::RngCore;
use shared_crypto::{vrf_evaluate, vrf_proof_to_hash, Secp256k1KeyPair};
use shared_types::{Address, ChainError, Hash, Signature, SignedTransaction, Transaction, U256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// State held while the wallet is open.
struct OpenWallet {
    identifier: WalletIdentifier,
    info: WalletInfo,
    file: WalletFileContent,
    key: SymmetricKey,
}

impl OpenWallet {
    fn keypair(&self, address: &Address) -> WalletResult<Secp256k1KeyPair> {
        self.info.key_of(address)?.keypair()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// The file must not exist yet.
    Create,
    /// The file must already exist.
    Overwrite,
}

/// HD soft wallet backed by an encrypted keystore file.
pub struct SoftWallet {
    config: WalletConfig,
    state: RwLock<Option<OpenWallet>>,
}

impl std::fmt::Debug for SoftWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftWallet")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl SoftWallet {
    pub fn new(config: WalletConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Create a new wallet file and open it. Returns the 24-word mnemonic.
    ///
    /// # Errors
    ///
    /// Path and password policy errors, `WalletFileExist` when `path` is taken.
    pub fn establish(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        password: &str,
        passphrase: &str,
    ) -> WalletResult<Zeroizing<String>> {
        let path = path.as_ref();
        check_wallet_path(path, &self.config)?;
        check_password(password, &self.config)?;

        let mut entropy = Zeroizing::new([0u8; WALLET_ENTROPY_BYTES]);
        rand::thread_rng().fill_bytes(&mut entropy[..]);
        let mnemonic = Mnemonic::from_entropy(&entropy[..])
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;

        let seed = Zeroizing::new(mnemonic.to_seed_normalized(passphrase));
        let info = WalletInfo::from_seed(seed.as_slice())?;
        let mut open = self.new_open_wallet(path, name, password, info)?;

        let mut state = self.state.write();
        write_wallet_file(&mut open, WriteMode::Create)?;
        info!(
            path = %path.display(),
            account = %open.info.accounts[0].address,
            "Wallet established"
        );
        *state = Some(open);

        Ok(Zeroizing::new(mnemonic.to_string()))
    }

    /// Recreate a wallet from its mnemonic, probing the chain for used
    /// accounts, then write it to `path` and open it.
    ///
    /// Up to `sync_account_number` consecutive indices after the first account
    /// are probed. An address is kept iff the reader knows its nonce; the
    /// scan stops at the first `AccountNotExist`, any other error aborts.
    pub async fn restore_wallet(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        password: &str,
        passphrase: &str,
        mnemonic: &str,
        reader: &dyn AddressInfoReader,
    ) -> WalletResult<()> {
        let path = path.as_ref();
        check_wallet_path(path, &self.config)?;
        check_password(password, &self.config)?;

        let mnemonic = Mnemonic::parse_normalized(mnemonic)
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(passphrase));
        let mut info = WalletInfo::from_seed(seed.as_slice())?;
        restore_used_accounts(&mut info, reader, self.config.sync_account_number).await?;

        let mut open = self.new_open_wallet(path, name, password, info)?;

        let mut state = self.state.write();
        write_wallet_file(&mut open, WriteMode::Create)?;
        info!(
            path = %path.display(),
            accounts = open.info.accounts.len(),
            "Wallet restored"
        );
        *state = Some(open);
        Ok(())
    }

    /// Decrypt the wallet file at `path` with `password`.
    ///
    /// Only an empty password is refused up front. Any other password goes
    /// to the key derivation, so one that breaks the creation policy fails
    /// as a wrong password.
    ///
    /// # Errors
    ///
    /// `WalletPasswordNotValid` when decryption or MAC authentication fails.
    pub fn open(&self, path: impl AsRef<Path>, name: &str, password: &str) -> WalletResult<()> {
        let path = path.as_ref();
        check_wallet_path(path, &self.config)?;
        if password.is_empty() {
            return Err(WalletError::PasswordIsNil);
        }
        if !path.exists() {
            return Err(WalletError::WalletFileNotExist);
        }

        let raw = std::fs::read(path)?;
        let file: WalletFileContent = serde_json::from_slice(&raw)?;
        let key = SymmetricKey::derive(password, &file.kdf_params)?;
        let plaintext = file.open(&key).map_err(|e| match e {
            WalletError::AesDecryption | WalletError::MacAuthentication => {
                warn!(path = %path.display(), error = %e, "Wallet decryption failed");
                WalletError::WalletPasswordNotValid
            }
            other => other,
        })?;
        let info = WalletInfo::decode(&plaintext)?;

        let mut state = self.state.write();
        *state = Some(OpenWallet {
            identifier: identifier(path, name),
            info,
            file,
            key,
        });
        info!(path = %path.display(), "Wallet opened");
        Ok(())
    }

    /// Re-encrypt the wallet to its file and forget the plaintext.
    pub fn close(&self) -> WalletResult<()> {
        let mut state = self.state.write();
        let open = state.as_mut().ok_or(WalletError::WalletNotOpen)?;
        write_wallet_file(open, WriteMode::Overwrite)?;
        info!(path = %open.identifier.path.display(), "Wallet closed");
        *state = None;
        Ok(())
    }

    pub fn status(&self) -> WalletStatus {
        if self.state.read().is_some() {
            WalletStatus::Opened
        } else {
            WalletStatus::Closed
        }
    }

    pub fn identifier(&self) -> WalletResult<WalletIdentifier> {
        self.with_open(|open| Ok(open.identifier.clone()))
    }

    // =========================================================================
    // ACCOUNTS
    // =========================================================================

    pub fn accounts(&self) -> WalletResult<Vec<Account>> {
        self.with_open(|open| Ok(open.info.accounts.clone()))
    }

    pub fn contains(&self, account: &Account) -> WalletResult<bool> {
        self.with_open(|open| Ok(open.info.contains(&account.address)))
    }

    pub fn balance(&self, address: &Address) -> WalletResult<U256> {
        self.with_open(|open| {
            open.info
                .balances
                .get(address)
                .copied()
                .ok_or(WalletError::InvalidAddress)
        })
    }

    /// Derive an account.
    ///
    /// - `"m"`: next index under the default prefix; bumps the default counter.
    /// - the default prefix itself: next index of the counter keyed by its
    ///   account segment (starting at 0 when unrecorded).
    /// - a full account path: used as-is.
    ///
    /// The resulting path must be the default prefix plus one index, else
    /// `InvalidDerivedPath`. A known account is returned unchanged. With
    /// `save` the account is added; the file is rewritten whenever state
    /// changed.
    pub fn derive(&self, path: &DerivationPath, save: bool) -> WalletResult<Account> {
        let mut state = self.state.write();
        let open = state.as_mut().ok_or(WalletError::WalletNotOpen)?;

        let (full_path, counter) = if path.is_master() {
            let index = open.info.next_default_index();
            (
                DerivationPath::default_prefix().child(index),
                Some((DEFAULT_ACCOUNT_VALUE, index)),
            )
        } else if path.len() == DEFAULT_DERIVED_PATH_LENGTH {
            let segment = path.indices()[ACCOUNT_VALUE_INDEX] & !HARDENED_OFFSET;
            let index = match open.info.derived_path_index.get(&segment) {
                Some(last) => last + 1,
                None => 0,
            };
            (path.child(index), Some((segment, index)))
        } else {
            (path.clone(), None)
        };

        if !full_path.is_valid_account_path() {
            return Err(WalletError::InvalidDerivedPath);
        }

        let key = open.info.master_key()?.derive_path(&full_path)?;
        let account = Account::new(key.address()?);
        if open.info.contains(&account.address) {
            return Ok(account);
        }

        if let Some((segment, index)) = counter {
            open.info.derived_path_index.insert(segment, index);
        }
        if save {
            open.info
                .insert(account.address, full_path.clone(), key, U256::zero(), 0);
        }
        if save || counter.is_some() {
            write_wallet_file(open, WriteMode::Overwrite)?;
        }

        debug!(path = %full_path, account = %account.address, save, "Derived account");
        Ok(account)
    }

    // =========================================================================
    // NONCES
    // =========================================================================

    /// Refresh every account nonce from the chain. Lookups that fail keep
    /// the previous value.
    pub async fn padding_address_nonce(&self, reader: &dyn AddressInfoReader) -> WalletResult<()> {
        let addresses: Vec<Address> = self.with_open(|open| {
            Ok(open.info.accounts.iter().map(|a| a.address).collect())
        })?;

        let mut nonces = Vec::with_capacity(addresses.len());
        for address in addresses {
            match reader.get_transaction_nonce(&address).await {
                Ok(nonce) => nonces.push((address, nonce)),
                Err(e) => warn!(account = %address, error = %e, "Nonce lookup failed"),
            }
        }

        let mut state = self.state.write();
        let open = state.as_mut().ok_or(WalletError::WalletNotOpen)?;
        for (address, nonce) in nonces {
            debug!(account = %address, nonce, "Refreshed nonce");
            open.info.nonce.insert(address, nonce);
        }
        Ok(())
    }

    /// Cached nonce of `address`; zero when never recorded.
    pub fn get_address_nonce(&self, address: &Address) -> WalletResult<u64> {
        self.with_open(|open| Ok(open.info.nonce.get(address).copied().unwrap_or(0)))
    }

    pub fn set_address_nonce(&self, address: &Address, nonce: u64) -> WalletResult<()> {
        let mut state = self.state.write();
        let open = state.as_mut().ok_or(WalletError::WalletNotOpen)?;
        open.info.nonce.insert(*address, nonce);
        Ok(())
    }

    // =========================================================================
    // KEYS
    // =========================================================================

    pub fn get_pk(&self, account: &Account) -> WalletResult<VerifyingKey> {
        self.with_open(|open| {
            let keypair = open.keypair(&account.address)?;
            Ok(keypair.signing_key().verifying_key().clone())
        })
    }

    /// Secret key of `address` for export; wiped when dropped.
    pub fn get_sk(&self, address: &Address) -> WalletResult<Zeroizing<[u8; 32]>> {
        self.with_open(|open| Ok(open.keypair(address)?.to_bytes()))
    }

    /// Verify a VRF proof made by `account` and return its index.
    pub fn vrf_verify(
        &self,
        account: &Account,
        seed: &[u8],
        proof: &[u8],
    ) -> WalletResult<[u8; 32]> {
        let key = self.get_pk(account)?;
        Ok(vrf_proof_to_hash(&key, seed, proof)?)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn with_open<T>(&self, f: impl FnOnce(&OpenWallet) -> WalletResult<T>) -> WalletResult<T> {
        let state = self.state.read();
        let open = state.as_ref().ok_or(WalletError::WalletNotOpen)?;
        f(open)
    }

    fn new_open_wallet(
        &self,
        path: &Path,
        name: &str,
        password: &str,
        info: WalletInfo,
    ) -> WalletResult<OpenWallet> {
        let file = WalletFileContent::new(&self.config);
        let key = SymmetricKey::derive(password, &file.kdf_params)?;
        Ok(OpenWallet {
            identifier: identifier(path, name),
            info,
            file,
            key,
        })
    }
}

impl Signer for SoftWallet {
    fn sign_hash(&self, account: &Account, hash: &Hash) -> WalletResult<Signature> {
        self.with_open(|open| Ok(open.keypair(&account.address)?.sign_hash(hash)?))
    }

    fn sign_tx(
        &self,
        account: &Account,
        tx: Transaction,
        chain_id: u64,
    ) -> WalletResult<SignedTransaction> {
        self.with_open(|open| {
            let signature = open
                .keypair(&account.address)?
                .sign_hash(&tx.signing_hash(chain_id))?;
            Ok(SignedTransaction {
                tx,
                chain_id,
                from: account.address,
                signature,
            })
        })
    }

    fn vrf_eval(&self, account: &Account, seed: &[u8]) -> WalletResult<([u8; 32], Vec<u8>)> {
        self.with_open(|open| {
            let keypair = open.keypair(&account.address)?;
            Ok(vrf_evaluate(keypair.signing_key(), seed)?)
        })
    }
}

fn identifier(path: &Path, name: &str) -> WalletIdentifier {
    WalletIdentifier {
        wallet_type: WalletType::SoftWallet,
        path: path.to_path_buf(),
        name: name.to_string(),
    }
}

async fn restore_used_accounts(
    info: &mut WalletInfo,
    reader: &dyn AddressInfoReader,
    depth: u32,
) -> WalletResult<()> {
    let master = info.master_key()?;
    for _ in 0..depth {
        let index = info.next_default_index();
        let path = DerivationPath::default_prefix().child(index);
        let key = master.derive_path(&path)?;
        let address = key.address()?;

        match reader.get_transaction_nonce(&address).await {
            Ok(nonce) => {
                let balance = reader.current_balance(&address).await;
                info!(account = %address, nonce, "Found used account");
                info.insert(address, path, key, balance, nonce);
                info.derived_path_index.insert(DEFAULT_ACCOUNT_VALUE, index);
            }
            Err(ChainError::AccountNotExist) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Seal the wallet and atomically replace its file (temp file + rename).
fn write_wallet_file(open: &mut OpenWallet, mode: WriteMode) -> WalletResult<()> {
    let path = open.identifier.path.clone();
    match (mode, path.exists()) {
        (WriteMode::Create, true) => return Err(WalletError::WalletFileExist),
        (WriteMode::Overwrite, false) => return Err(WalletError::WalletFileNotExist),
        _ => {}
    }

    let plaintext = open.info.encode()?;
    open.file.seal(&plaintext, &open.key)?;
    let bytes = serde_json::to_vec(&open.file)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_path(&path);
    std::fs::write(&tmp_path, &bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, &path)?;
    debug!(path = %path.display(), "Wrote wallet file");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
