//! Driven ports (Outbound dependencies)

use async_trait::async_trait;
use shared_types::{Address, ChainResult, U256};

/// Account state lookups used by restore and nonce refresh.
#[async_trait]
pub trait AddressInfoReader: Send + Sync {
    /// Current balance; zero for an unknown account.
    async fn current_balance(&self, address: &Address) -> U256;

    /// Next transaction nonce.
    ///
    /// `ChainError::AccountNotExist` marks an address that was never used.
    async fn get_transaction_nonce(&self, address: &Address) -> ChainResult<u64>;
}
