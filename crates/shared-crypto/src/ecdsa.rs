//! # ECDSA Signatures (secp256k1)
//!
//! Recoverable ECDSA over 32-byte prehashed digests.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization
//! - Signatures are 65 bytes `r ‖ s ‖ v` so the signer address can be
//!   recovered from the digest alone
//!
//! ## Use Cases
//!
//! - Consensus message witnesses
//! - Transaction signing

use crate::CryptoError;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use shared_types::{Address, Hash};
use zeroize::Zeroizing;

/// Length of a recoverable signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// secp256k1 ECDSA keypair.
#[derive(Clone)]
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl std::fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes(bytes.into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Underlying signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key_compressed(&self) -> [u8; 33] {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        let mut out = [0u8; 33];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Uncompressed SEC1 public key (65 bytes, `0x04 ‖ x ‖ y`).
    pub fn public_key_uncompressed(&self) -> [u8; 65] {
        uncompressed(self.signing_key.verifying_key())
    }

    /// Normal address of this key.
    pub fn address(&self) -> Address {
        address_from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign a 32-byte digest, producing `r ‖ s ‖ v`.
    pub fn sign_hash(&self, hash: &Hash) -> Result<[u8; SIGNATURE_LENGTH], CryptoError> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        let mut out = [0u8; SIGNATURE_LENGTH];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }

    /// Secret key bytes, wiped when the returned buffer is dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes().into())
    }
}

/// Recover the verifying key that produced `signature` over `hash`.
pub fn recover_public_key(
    hash: &Hash,
    signature: &[u8; SIGNATURE_LENGTH],
) -> Result<VerifyingKey, CryptoError> {
    let recovery_id = parse_recovery_id(signature[64])?;
    let sig = Signature::from_slice(&signature[..64]).map_err(|_| CryptoError::InvalidSignature)?;

    VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)
}

/// Recover the signer address from `signature` over `hash`.
pub fn recover_address(
    hash: &Hash,
    signature: &[u8; SIGNATURE_LENGTH],
) -> Result<Address, CryptoError> {
    let key = recover_public_key(hash, signature)?;
    Ok(address_from_verifying_key(&key))
}

/// Derive the normal address of a public key.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    Address::from_uncompressed_pubkey(&uncompressed(key))
}

fn uncompressed(key: &VerifyingKey) -> [u8; 65] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; 65];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Accepts both raw (0/1) and Ethereum-style (27/28) recovery ids.
fn parse_recovery_id(v: u8) -> Result<RecoveryId, CryptoError> {
    let normalized = if v >= 27 { v - 27 } else { v };
    RecoveryId::from_byte(normalized).ok_or(CryptoError::InvalidSignature)
}
