//! In-process signer over a raw secp256k1 key.
//!
//! Used by devnets and tests that have no wallet file.

use crate::domain::SignError;
use crate::ports::MsgSigner;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, Hash, Signature};

/// [`MsgSigner`] backed by an in-memory keypair.
#[derive(Debug, Clone)]
pub struct KeyPairSigner {
    keypair: Secp256k1KeyPair,
    address: Address,
}

impl KeyPairSigner {
    pub fn new(keypair: Secp256k1KeyPair) -> Self {
        let address = keypair.address();
        Self { keypair, address }
    }

    /// Fresh random key.
    pub fn generate() -> Self {
        Self::new(Secp256k1KeyPair::generate())
    }
}

impl MsgSigner for KeyPairSigner {
    fn sign_hash(&self, hash: &Hash) -> Result<Signature, SignError> {
        self.keypair
            .sign_hash(hash)
            .map_err(|e| SignError::Failed(e.to_string()))
    }

    fn address(&self) -> Address {
        self.address
    }
}
