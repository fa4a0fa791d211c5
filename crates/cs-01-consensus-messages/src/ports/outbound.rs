//! Driven ports (Outbound dependencies)

use crate::domain::SignError;
use shared_types::{Address, Hash, Signature};

/// Produces witnesses for outgoing consensus messages.
///
/// Implemented by the soft wallet for a single unlocked account; the key
/// material never leaves the implementor.
pub trait MsgSigner: Send + Sync {
    /// Sign a 32-byte content hash, returning `r ‖ s ‖ v`.
    fn sign_hash(&self, hash: &Hash) -> Result<Signature, SignError>;

    /// Address the witness will carry.
    fn address(&self) -> Address;
}
