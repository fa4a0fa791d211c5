//! # Core Domain Entities
//!
//! Identity and chain primitives every subsystem of the node core speaks.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `AddressType`
//! - **Chain**: `Hash`, `Block`, `Transaction`, `SignedTransaction`

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{serde_as, Bytes};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

// Re-export U256 from primitive-types for balances and transaction values
pub use primitive_types::U256;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Length of an address in bytes: 2-byte type tag followed by 20 key bytes.
pub const ADDRESS_LENGTH: usize = 22;

/// Length of the type tag prefix of an address.
pub const ADDRESS_TYPE_LENGTH: usize = 2;

/// A 65-byte recoverable secp256k1 signature (`r ‖ s ‖ v`).
pub type Signature = [u8; 65];

/// Address type tag, stored big-endian in the first two bytes of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AddressType {
    /// Ordinary account derived from a secp256k1 public key.
    Normal = 0x0000,
    /// Verifier registration account.
    Verification = 0x0002,
}

impl AddressType {
    /// Decode a raw type tag.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Self::Normal),
            0x0002 => Some(Self::Verification),
            _ => None,
        }
    }
}

/// A 22-byte account identity.
///
/// Derived from an ECDSA public key: the big-endian [`AddressType`] tag
/// followed by the last 20 bytes of `Keccak256(uncompressed_pubkey[1..])`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Build an address from a type tag and the 20 trailing key bytes.
    pub fn from_parts(ty: AddressType, key_bytes: &[u8; 20]) -> Self {
        let mut out = [0u8; ADDRESS_LENGTH];
        out[..ADDRESS_TYPE_LENGTH].copy_from_slice(&(ty as u16).to_be_bytes());
        out[ADDRESS_TYPE_LENGTH..].copy_from_slice(key_bytes);
        Self(out)
    }

    /// Build a normal address from an uncompressed SEC1 public key (65 bytes, `0x04 ‖ x ‖ y`).
    pub fn from_uncompressed_pubkey(pubkey: &[u8; 65]) -> Self {
        let digest = keccak256(&pubkey[1..]);
        let mut tail = [0u8; 20];
        tail.copy_from_slice(&digest[12..]);
        Self::from_parts(AddressType::Normal, &tail)
    }

    /// Raw type tag.
    pub fn type_tag(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// Decoded type tag, if known.
    pub fn address_type(&self) -> Option<AddressType> {
        AddressType::from_u16(self.type_tag())
    }

    /// True for the all-zero address.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

/// Failure to parse an [`Address`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid address length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let arr: [u8; ADDRESS_LENGTH] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| AddressParseError::InvalidLength {
                    expected: ADDRESS_LENGTH,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

// Addresses travel as hex strings so they can key JSON maps in the wallet file.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// CLUSTER B: THE CHAIN
// =============================================================================

/// A 32-byte Keccak256 hash.
pub type Hash = [u8; 32];

/// The all-zero hash, used on the wire to mean "no block".
pub const EMPTY_HASH: Hash = [0u8; 32];

/// Keccak256 of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex rendering of a hash, for logs.
pub fn hash_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// The view of a block the consensus core needs.
///
/// Blocks are opaque to the core: validation, execution and storage are
/// delegated to collaborators. Blocks are value types; ownership moves from
/// the pool to the state machine when a block is proposed.
pub trait Block: Clone + fmt::Debug + Send + Sync + 'static {
    /// Block height.
    fn number(&self) -> u64;

    /// Block hash (the `block_id` referenced by proposals and votes).
    fn hash(&self) -> Hash;

    /// Special blocks are never proposed.
    fn is_special(&self) -> bool;
}

/// An unsigned value transfer or contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's account nonce.
    pub nonce: u64,
    /// Recipient (`None` for contract creation).
    pub to: Option<Address>,
    /// Amount in base units.
    pub value: U256,
    /// Gas price in base units.
    pub gas_price: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Call data.
    pub data: Vec<u8>,
}

impl Transaction {
    /// Digest signed by the sender, bound to `chain_id` for replay protection.
    pub fn signing_hash(&self, chain_id: u64) -> Hash {
        // bincode over owned fields is infallible for this shape
        let encoded = bincode::serialize(&(self, chain_id)).unwrap_or_default();
        keccak256(&encoded)
    }
}

/// A transaction with the sender's recoverable signature attached.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The signed payload.
    pub tx: Transaction,
    /// Chain the signature is bound to.
    pub chain_id: u64,
    /// Sender address.
    pub from: Address,
    /// Signature over [`Transaction::signing_hash`].
    #[serde_as(as = "Bytes")]
    pub signature: Signature,
}

impl SignedTransaction {
    /// Transaction hash (covers payload and signature).
    pub fn hash(&self) -> Hash {
        let encoded = bincode::serialize(self).unwrap_or_default();
        keccak256(&encoded)
    }
}
