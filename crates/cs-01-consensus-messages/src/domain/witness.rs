//! Witness envelope and the signing contract shared by every signable message.

use super::{MessageError, MessageResult};
use crate::ports::MsgSigner;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::recover_address;
use shared_types::{keccak256, Address, Hash, Signature};

/// `(address, signature)` attached to a consensus message.
///
/// Invariant of a valid witness: `recover(sign, content_hash) == address`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitMsg {
    pub address: Address,
    #[serde_as(as = "Bytes")]
    pub sign: Signature,
}

impl WitMsg {
    /// Check that `sign` over `hash` recovers to `address`.
    pub fn valid(&self, hash: &Hash) -> MessageResult<()> {
        let recovered =
            recover_address(hash, &self.sign).map_err(|_| MessageError::InvalidSignature)?;
        if recovered != self.address {
            return Err(MessageError::InvalidSignature);
        }
        Ok(())
    }
}

/// A message carrying a witness over its content hash.
///
/// The content hash is Keccak256 of the canonical bincode encoding of the
/// message with the witness cleared, so signing never depends on the
/// signature itself.
pub trait SignableMessage: Serialize + Clone {
    fn witness(&self) -> Option<&WitMsg>;

    fn set_witness(&mut self, witness: Option<WitMsg>);

    /// Deterministic digest the witness signs.
    fn content_hash(&self) -> Hash {
        let mut unsigned = self.clone();
        unsigned.set_witness(None);
        // Plain structs of integers and fixed arrays always encode
        let encoded = bincode::serialize(&unsigned).unwrap_or_default();
        keccak256(&encoded)
    }

    /// Validate the witness against the content hash.
    fn valid(&self) -> MessageResult<()> {
        let witness = self.witness().ok_or(MessageError::MissingWitness)?;
        witness.valid(&self.content_hash())
    }

    /// Address of the signer, if signed.
    fn signer(&self) -> Option<Address> {
        self.witness().map(|w| w.address)
    }

    /// Sign with `signer` and attach the resulting witness.
    fn sign_with<S: MsgSigner + ?Sized>(mut self, signer: &S) -> MessageResult<Self> {
        let hash = self.content_hash();
        let sign = signer
            .sign_hash(&hash)
            .map_err(|e| MessageError::SigningFailed(e.to_string()))?;
        self.set_witness(Some(WitMsg {
            address: signer.address(),
            sign,
        }));
        Ok(self)
    }
}
