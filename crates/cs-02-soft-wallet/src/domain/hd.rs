//! BIP32 hierarchical deterministic keys over secp256k1.
//!
//! ```text
//! master:  I = HMAC-SHA512("Bitcoin seed", seed)          k = IL, c = IR
//! child i: I = HMAC-SHA512(c, 0x00 ‖ k ‖ i)   (i hardened)
//!          I = HMAC-SHA512(c, K ‖ i)          (i normal, K compressed)
//!          k_i = IL + k (mod n), c_i = IR
//! ```

use super::{DerivationPath, WalletError, WalletResult, HARDENED_OFFSET};
use hmac::{Hmac, Mac};
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use shared_crypto::Secp256k1KeyPair;
use shared_types::Address;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

const MASTER_KEY_SALT: &[u8] = b"Bitcoin seed";

/// Extended private key: secret scalar plus chain code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExtendedKeyJson", into = "ExtendedKeyJson")]
pub struct ExtendedKey {
    secret: Zeroizing<[u8; 32]>,
    chain_code: [u8; 32],
    depth: u8,
    child_number: u32,
}

impl std::fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

impl ExtendedKey {
    /// Master key of `seed`.
    pub fn new_master(seed: &[u8]) -> WalletResult<Self> {
        let digest = hmac_sha512(MASTER_KEY_SALT, &[seed])?;
        let secret = valid_secret(&digest[..32])?;
        Ok(Self {
            secret: Zeroizing::new(secret),
            chain_code: chain_code(&digest),
            depth: 0,
            child_number: 0,
        })
    }

    /// Private child derivation.
    pub fn child(&self, index: u32) -> WalletResult<Self> {
        let keypair = self.keypair()?;
        let index_bytes = index.to_be_bytes();
        let digest = if index >= HARDENED_OFFSET {
            hmac_sha512(&self.chain_code, &[&[0u8], &self.secret[..], &index_bytes])?
        } else {
            hmac_sha512(
                &self.chain_code,
                &[&keypair.public_key_compressed(), &index_bytes],
            )?
        };

        let tweak = parse_scalar(&digest[..32])?;
        let parent = parse_scalar(&self.secret[..])?;
        let child = tweak + parent;
        if bool::from(child.is_zero()) {
            return Err(WalletError::KeyDerivation("child key is zero".to_string()));
        }

        Ok(Self {
            secret: Zeroizing::new(child.to_bytes().into()),
            chain_code: chain_code(&digest),
            depth: self.depth.saturating_add(1),
            child_number: index,
        })
    }

    /// Walk `path` from this key.
    pub fn derive_path(&self, path: &DerivationPath) -> WalletResult<Self> {
        path.indices()
            .iter()
            .try_fold(self.clone(), |key, index| key.child(*index))
    }

    /// Signing keypair of this node.
    pub fn keypair(&self) -> WalletResult<Secp256k1KeyPair> {
        Ok(Secp256k1KeyPair::from_bytes(&self.secret)?)
    }

    /// Normal address of this node's public key.
    pub fn address(&self) -> WalletResult<Address> {
        Ok(self.keypair()?.address())
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> u32 {
        self.child_number
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> WalletResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn chain_code(digest: &[u8; 64]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[32..]);
    out
}

fn parse_scalar(bytes: &[u8]) -> WalletResult<Scalar> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
        .ok_or_else(|| WalletError::KeyDerivation("scalar out of range".to_string()))
}

fn valid_secret(bytes: &[u8]) -> WalletResult<[u8; 32]> {
    let scalar = parse_scalar(bytes)?;
    if bool::from(scalar.is_zero()) {
        return Err(WalletError::KeyDerivation("master key is zero".to_string()));
    }
    Ok(scalar.to_bytes().into())
}

/// On-disk shape of an extended key inside the wallet plaintext.
#[derive(Serialize, Deserialize)]
struct ExtendedKeyJson {
    #[serde(rename = "Key", with = "hex::serde")]
    key: Vec<u8>,
    #[serde(rename = "ChainCode", with = "hex::serde")]
    chain_code: Vec<u8>,
    #[serde(rename = "Depth")]
    depth: u8,
    #[serde(rename = "ChildNum")]
    child_number: u32,
    #[serde(rename = "IsPrivate")]
    is_private: bool,
}

impl From<ExtendedKey> for ExtendedKeyJson {
    fn from(key: ExtendedKey) -> Self {
        Self {
            key: key.secret.to_vec(),
            chain_code: key.chain_code.to_vec(),
            depth: key.depth,
            child_number: key.child_number,
            is_private: true,
        }
    }
}

impl TryFrom<ExtendedKeyJson> for ExtendedKey {
    type Error = WalletError;

    fn try_from(json: ExtendedKeyJson) -> WalletResult<Self> {
        let secret: [u8; 32] = json
            .key
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::Serialization("extended key length".to_string()))?;
        let chain_code: [u8; 32] = json
            .chain_code
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::Serialization("chain code length".to_string()))?;
        if !json.is_private {
            return Err(WalletError::Serialization(
                "public extended keys are not stored".to_string(),
            ));
        }
        Ok(Self {
            secret: Zeroizing::new(secret),
            chain_code,
            depth: json.depth,
            child_number: json.child_number,
        })
    }
}
