//! Password and wallet-path policies.

use super::{WalletError, WalletResult};
use crate::config::WalletConfig;
use std::path::Path;

/// Passwords are printable ASCII without spaces, `password_min..=password_max` long.
pub fn check_password(password: &str, config: &WalletConfig) -> WalletResult<()> {
    if password.is_empty() {
        return Err(WalletError::PasswordIsNil);
    }
    let len = password.len();
    if !password.chars().all(|c| c.is_ascii_graphic())
        || len < config.password_min
        || len > config.password_max
    {
        return Err(WalletError::PasswordOrPassPhraseIllegal);
    }
    Ok(())
}

/// Wallet files must live under the configured home directory.
pub fn check_wallet_path(path: &Path, config: &WalletConfig) -> WalletResult<()> {
    if !path.starts_with(&config.home_dir) || path == config.home_dir {
        return Err(WalletError::WalletPathError);
    }
    Ok(())
}
