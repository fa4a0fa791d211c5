//! Domain layer for the soft wallet
//!
//! - path: BIP32 derivation paths and the default account prefix
//! - hd: extended private keys
//! - keystore: the encrypted wallet file
//! - info: decrypted wallet contents
//! - policy: password and path rules

mod error;
mod hd;
mod info;
mod keystore;
mod path;
mod policy;

pub use error::*;
pub use hd::*;
pub use info::*;
pub use keystore::*;
pub use path::*;
pub use policy::*;

/// Default wallet file name.
pub const DEFAULT_WALLET_NAME: &str = "CSWallet";

/// Mnemonic entropy in bytes (24 words).
pub const WALLET_ENTROPY_BYTES: usize = 32;

/// Lifecycle state of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletStatus {
    Opened,
    Closed,
}

/// Kind of wallet backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletType {
    SoftWallet,
}

/// Identifies a wallet by type, file path and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletIdentifier {
    pub wallet_type: WalletType,
    pub path: std::path::PathBuf,
    pub name: String,
}
