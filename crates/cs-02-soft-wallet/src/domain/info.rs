//! Decrypted wallet contents.

use super::{
    DerivationPath, ExtendedKey, WalletError, WalletResult, ADDRESS_INDEX_START_VALUE,
    DEFAULT_ACCOUNT_VALUE,
};
use serde::{Deserialize, Serialize};
use shared_types::{Address, U256};
use std::collections::BTreeMap;
use zeroize::{Zeroize, Zeroizing};

/// An account held by a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl From<Address> for Account {
    fn from(address: Address) -> Self {
        Self { address }
    }
}

/// Plaintext wallet state, serialized as the JSON inside the keystore.
#[derive(Default, Serialize, Deserialize)]
pub struct WalletInfo {
    #[serde(rename = "accounts")]
    pub accounts: Vec<Account>,
    #[serde(rename = "paths")]
    pub paths: BTreeMap<Address, DerivationPath>,
    #[serde(rename = "extend_keys")]
    pub extend_keys: BTreeMap<Address, ExtendedKey>,
    #[serde(rename = "balances")]
    pub balances: BTreeMap<Address, U256>,
    #[serde(rename = "Nonce")]
    pub nonce: BTreeMap<Address, u64>,
    /// Last used address index per account segment.
    #[serde(rename = "DerivedPathIndex")]
    pub derived_path_index: BTreeMap<u32, u32>,
    #[serde(rename = "seed", with = "hex::serde")]
    pub seed: Vec<u8>,
}

impl Drop for WalletInfo {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

impl std::fmt::Debug for WalletInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletInfo")
            .field("accounts", &self.accounts)
            .field("derived_path_index", &self.derived_path_index)
            .finish_non_exhaustive()
    }
}

impl WalletInfo {
    /// Fresh wallet state for `seed`: the first account at
    /// `m/44'/709394'/0'/0/1` with a zero balance.
    pub fn from_seed(seed: &[u8]) -> WalletResult<Self> {
        let mut info = Self::default();
        info.seed = seed.to_vec();
        let path = DerivationPath::default_prefix().child(ADDRESS_INDEX_START_VALUE);
        let key = info.master_key()?.derive_path(&path)?;
        let address = key.address()?;

        info.insert(address, path, key, U256::zero(), 0);
        info.derived_path_index
            .insert(DEFAULT_ACCOUNT_VALUE, ADDRESS_INDEX_START_VALUE);
        Ok(info)
    }

    pub fn master_key(&self) -> WalletResult<ExtendedKey> {
        ExtendedKey::new_master(&self.seed)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.extend_keys.contains_key(address)
    }

    /// Record an account; a known address is left untouched.
    pub fn insert(
        &mut self,
        address: Address,
        path: DerivationPath,
        key: ExtendedKey,
        balance: U256,
        nonce: u64,
    ) {
        if self.contains(&address) {
            return;
        }
        self.accounts.push(Account::new(address));
        self.paths.insert(address, path);
        self.extend_keys.insert(address, key);
        self.balances.insert(address, balance);
        self.nonce.insert(address, nonce);
    }

    pub fn key_of(&self, address: &Address) -> WalletResult<&ExtendedKey> {
        self.extend_keys
            .get(address)
            .ok_or(WalletError::InvalidAddress)
    }

    /// Next unused index of the default account.
    pub fn next_default_index(&self) -> u32 {
        self.derived_path_index
            .get(&DEFAULT_ACCOUNT_VALUE)
            .copied()
            .unwrap_or(0)
            + 1
    }

    pub fn encode(&self) -> WalletResult<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(serde_json::to_vec(self)?))
    }

    pub fn decode(bytes: &[u8]) -> WalletResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
