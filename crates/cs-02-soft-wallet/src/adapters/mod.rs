//! Adapters exposing the wallet to other subsystems

mod wallet_signer;

pub use wallet_signer::WalletSigner;
