//! Encrypted wallet file format.
//!
//! ```text
//! plaintext  = len (u32 BE) ‖ json ‖ random padding to 16
//! Cipher     = AES-256-CBC(key, IV, plaintext)
//! MacCipher  = AES-256-CBC(key, IV, Keccak256(len ‖ json))
//! key        = scrypt(password, salt, n, r, p, keyLen = 32)
//! ```

use super::{WalletError, WalletResult};
use crate::config::WalletConfig;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use shared_crypto::{
    aes256_cbc_decrypt, aes256_cbc_encrypt, scrypt_derive, CryptoError, ScryptParams,
    AES_BLOCK_SIZE,
};
use shared_types::keccak256;
use zeroize::Zeroizing;

pub const KDF_SCRYPT: &str = "Scrypt";
pub const SYMMETRIC_ALG_TYPE: &str = "AES-256";
pub const SYMMETRIC_ALG_MODE: &str = "CBC";
pub const SYMMETRIC_KEY_LEN: usize = 32;

const LENGTH_PREFIX: usize = 4;
const SALT_LEN: usize = 32;

/// scrypt parameters persisted next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub n: u32,
    pub r: u32,
    pub p: u32,
    #[serde(rename = "kdfType")]
    pub kdf_type: String,
    #[serde(rename = "keyLen")]
    pub key_len: usize,
    /// Hex-encoded salt.
    pub salt: String,
}

impl KdfParams {
    /// Fresh parameters with a random salt.
    pub fn generate(config: &WalletConfig) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self {
            n: config.scrypt_n,
            r: config.scrypt_r,
            p: config.scrypt_p,
            kdf_type: KDF_SCRYPT.to_string(),
            key_len: config.key_len,
            salt: hex::encode(salt),
        }
    }
}

/// The wallet file as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFileContent {
    #[serde(rename = "Cipher")]
    pub cipher: String,
    #[serde(rename = "MacCipher")]
    pub mac_cipher: String,
    #[serde(rename = "AlgType")]
    pub alg_type: String,
    #[serde(rename = "ModeType")]
    pub mode_type: String,
    #[serde(rename = "IV")]
    pub iv: [u8; AES_BLOCK_SIZE],
    #[serde(rename = "kdf")]
    pub kdf: String,
    #[serde(rename = "kdfparams")]
    pub kdf_params: KdfParams,
}

impl WalletFileContent {
    /// Empty file content with a random IV and fresh KDF parameters.
    pub fn new(config: &WalletConfig) -> Self {
        let mut iv = [0u8; AES_BLOCK_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        Self {
            cipher: String::new(),
            mac_cipher: String::new(),
            alg_type: SYMMETRIC_ALG_TYPE.to_string(),
            mode_type: SYMMETRIC_ALG_MODE.to_string(),
            iv,
            kdf: KDF_SCRYPT.to_string(),
            kdf_params: KdfParams::generate(config),
        }
    }

    /// Encrypt `plaintext` into `cipher` / `mac_cipher`.
    pub fn seal(&mut self, plaintext: &[u8], key: &SymmetricKey) -> WalletResult<()> {
        let len = u32::try_from(plaintext.len())
            .map_err(|_| WalletError::Serialization("wallet plaintext too large".to_string()))?;

        let mut data = Zeroizing::new(Vec::with_capacity(
            LENGTH_PREFIX + plaintext.len() + AES_BLOCK_SIZE,
        ));
        data.extend_from_slice(&len.to_be_bytes());
        data.extend_from_slice(plaintext);
        let authenticated = data.len();

        let remainder = data.len() % AES_BLOCK_SIZE;
        if remainder != 0 {
            let mut padding = vec![0u8; AES_BLOCK_SIZE - remainder];
            rand::thread_rng().fill_bytes(&mut padding);
            data.extend_from_slice(&padding);
        }

        let mac = aes256_cbc_encrypt(&key.mac_key, &self.iv, &keccak256(&data[..authenticated]))?;
        let cipher = aes256_cbc_encrypt(&key.encrypt_key, &self.iv, &data)?;

        self.mac_cipher = hex::encode(mac);
        self.cipher = hex::encode(cipher);
        Ok(())
    }

    /// Decrypt and authenticate the stored plaintext.
    ///
    /// # Errors
    ///
    /// `AesDecryption` when the cipher rejects the input; `MacAuthentication`
    /// when the length prefix overruns the payload or the MAC differs. A wrong
    /// password surfaces as one of the two.
    pub fn open(&self, key: &SymmetricKey) -> WalletResult<Zeroizing<Vec<u8>>> {
        let cipher = hex::decode(&self.cipher).map_err(|_| WalletError::AesDecryption)?;
        let data = Zeroizing::new(
            aes256_cbc_decrypt(&key.encrypt_key, &self.iv, &cipher)
                .map_err(|_| WalletError::AesDecryption)?,
        );
        if data.len() < LENGTH_PREFIX {
            return Err(WalletError::MacAuthentication);
        }

        let mut prefix = [0u8; LENGTH_PREFIX];
        prefix.copy_from_slice(&data[..LENGTH_PREFIX]);
        let len = u32::from_be_bytes(prefix) as usize;
        if len > data.len() - LENGTH_PREFIX {
            return Err(WalletError::MacAuthentication);
        }

        let mac_cipher = hex::decode(&self.mac_cipher).map_err(|_| WalletError::AesDecryption)?;
        let mac = aes256_cbc_decrypt(&key.mac_key, &self.iv, &mac_cipher)
            .map_err(|_| WalletError::AesDecryption)?;

        let expected = keccak256(&data[..LENGTH_PREFIX + len]);
        if mac.len() < expected.len() || mac[..expected.len()] != expected {
            return Err(WalletError::MacAuthentication);
        }

        Ok(Zeroizing::new(data[LENGTH_PREFIX..LENGTH_PREFIX + len].to_vec()))
    }
}

/// Encryption and MAC keys derived from the wallet password.
pub struct SymmetricKey {
    encrypt_key: Zeroizing<[u8; SYMMETRIC_KEY_LEN]>,
    mac_key: Zeroizing<[u8; SYMMETRIC_KEY_LEN]>,
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl SymmetricKey {
    /// Derive the wallet keys from `password` under `params`.
    ///
    /// # Errors
    ///
    /// `NotSupported` for a KDF other than scrypt, `InvalidKdfParameter` for
    /// a key length other than 32 or unusable parameters, `DeriveKey` when
    /// scrypt fails.
    pub fn derive(password: &str, params: &KdfParams) -> WalletResult<Self> {
        if params.kdf_type != KDF_SCRYPT {
            return Err(WalletError::NotSupported);
        }
        if params.key_len != SYMMETRIC_KEY_LEN {
            return Err(WalletError::InvalidKdfParameter);
        }
        let salt = hex::decode(&params.salt).map_err(|_| WalletError::InvalidKdfParameter)?;

        let scrypt_params = ScryptParams {
            n: params.n,
            r: params.r,
            p: params.p,
            key_len: params.key_len,
        };
        let derived =
            scrypt_derive(password.as_bytes(), &salt, &scrypt_params).map_err(|e| match e {
                CryptoError::InvalidKdfParameter(_) => WalletError::InvalidKdfParameter,
                _ => WalletError::DeriveKey,
            })?;
        if derived.len() != SYMMETRIC_KEY_LEN {
            return Err(WalletError::DeriveKey);
        }

        let mut encrypt_key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
        encrypt_key.copy_from_slice(&derived);
        let mac_key = encrypt_key.clone();
        Ok(Self {
            encrypt_key,
            mac_key,
        })
    }
}
