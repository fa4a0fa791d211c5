//! Error types for the soft wallet

use shared_crypto::CryptoError;
use shared_types::ChainError;
use thiserror::Error;

/// Wallet errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet is not open")]
    WalletNotOpen,

    #[error("address not in wallet")]
    InvalidAddress,

    #[error("invalid derived path")]
    InvalidDerivedPath,

    #[error("wallet password not valid")]
    WalletPasswordNotValid,

    #[error("password is nil")]
    PasswordIsNil,

    #[error("password or passphrase illegal")]
    PasswordOrPassPhraseIllegal,

    #[error("wallet path error")]
    WalletPathError,

    #[error("wallet file already exists")]
    WalletFileExist,

    #[error("wallet file does not exist")]
    WalletFileNotExist,

    #[error("kdf not supported")]
    NotSupported,

    #[error("invalid kdf parameter")]
    InvalidKdfParameter,

    #[error("derive key failed")]
    DeriveKey,

    #[error("aes decryption failed")]
    AesDecryption,

    #[error("mac authentication failed")]
    MacAuthentication,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("hd key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("wallet not found")]
    NotFindWallet,

    #[error("wallet manager is not running")]
    WalletManagerNotRunning,

    #[error("wallet manager is empty")]
    WalletManagerIsEmpty,

    #[error("wallet file io: {0}")]
    Io(String),

    #[error("wallet encoding: {0}")]
    Serialization(String),

    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),

    #[error("chain: {0}")]
    Chain(#[from] ChainError),
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Serialization(e.to_string())
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
