//! # CS-02 Soft Wallet
//!
//! HD soft wallet with an encrypted keystore file.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        WalletManager                          │
//! │   registry of open wallets, nonce refresh every 60 s          │
//! └───────────────────────────┬───────────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼───────────────────────────────────┐
//! │                         SoftWallet                            │
//! │  RwLock<Option<OpenWallet>>                                   │
//! │   - establish / restore_wallet / open / close                 │
//! │   - derive (BIP32, m/44'/709394'/0'/0/i)                      │
//! │   - Signer: sign_hash / sign_tx / vrf_eval  (read lock)       │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │                               │
//!        WalletFileContent                 AddressInfoReader
//!   scrypt → AES-256-CBC + MAC               (restore, nonces)
//! ```
//!
//! ## Security
//!
//! - Secret keys are materialized only inside the read-lock scope of a
//!   signing call and wiped on drop.
//! - A wrong password is indistinguishable from a corrupted file: both
//!   surface as `WalletPasswordNotValid`.
//! - Wallet files are replaced atomically and created with mode `0600`.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::WalletSigner;
pub use config::{WalletConfig, WalletManagerConfig};
pub use domain::{
    Account, DerivationPath, WalletError, WalletIdentifier, WalletResult, WalletStatus,
    WalletType, DEFAULT_DERIVED_PATH,
};
pub use ports::{AddressInfoReader, Signer};
pub use service::{SoftWallet, WalletManager};
