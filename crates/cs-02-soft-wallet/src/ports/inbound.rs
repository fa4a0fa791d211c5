//! Driving ports (Inbound API)

use crate::domain::{Account, WalletResult};
use shared_types::{Hash, Signature, SignedTransaction, Transaction};

/// Signing capability of an open wallet.
///
/// Every operation runs under the wallet's read lock; secret keys are
/// materialized only for the duration of the call.
pub trait Signer: Send + Sync {
    /// Recoverable signature of `hash` by `account`.
    fn sign_hash(&self, account: &Account, hash: &Hash) -> WalletResult<Signature>;

    /// Sign `tx` for `chain_id`.
    fn sign_tx(
        &self,
        account: &Account,
        tx: Transaction,
        chain_id: u64,
    ) -> WalletResult<SignedTransaction>;

    /// VRF evaluation at `seed`: `(index, proof)`.
    fn vrf_eval(&self, account: &Account, seed: &[u8]) -> WalletResult<([u8; 32], Vec<u8>)>;
}
