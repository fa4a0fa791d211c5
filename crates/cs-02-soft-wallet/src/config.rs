//! Wallet configuration

use std::path::PathBuf;
use std::time::Duration;

/// Keystore and HD wallet configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Wallet files must live under this directory.
    pub home_dir: PathBuf,
    /// scrypt CPU/memory cost for newly created wallet files.
    pub scrypt_n: u32,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
    /// Derived key length; only 32 is accepted when opening a file.
    pub key_len: usize,
    /// How many consecutive indices a restore probes on chain.
    pub sync_account_number: u32,
    pub password_min: usize,
    pub password_max: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            scrypt_n: 1 << 12,
            scrypt_r: 8,
            scrypt_p: 6,
            key_len: 32,
            sync_account_number: 20,
            password_min: 8,
            password_max: 24,
        }
    }
}

impl WalletConfig {
    /// Cheap scrypt parameters rooted at `home_dir`, for tests.
    pub fn for_testing(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            scrypt_n: 16,
            scrypt_r: 1,
            scrypt_p: 1,
            ..Self::default()
        }
    }

    /// Default wallet file location: `<home>/.cs-bft/CSWallet`.
    pub fn default_wallet_path(&self) -> PathBuf {
        self.home_dir.join(".cs-bft").join(crate::domain::DEFAULT_WALLET_NAME)
    }
}

fn default_home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Wallet manager configuration.
#[derive(Debug, Clone)]
pub struct WalletManagerConfig {
    /// Period of the background nonce refresh.
    pub refresh_interval: Duration,
}

impl Default for WalletManagerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
        }
    }
}

impl WalletManagerConfig {
    pub fn for_testing() -> Self {
        Self {
            refresh_interval: Duration::from_millis(100),
        }
    }
}
