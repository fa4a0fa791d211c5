//! # Symmetric Encryption
//!
//! AES-256-CBC without padding. Callers pad to the block size themselves
//! (the wallet file pads with random bytes behind a length prefix).

use crate::CryptoError;
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes (and IV length).
pub const AES_BLOCK_SIZE: usize = 16;

/// Encrypt `plaintext` (a multiple of [`AES_BLOCK_SIZE`]) with AES-256-CBC.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the input is not block aligned.
pub fn aes256_cbc_encrypt(
    key: &[u8; 32],
    iv: &[u8; AES_BLOCK_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::EncryptionFailed(format!(
            "plaintext length {} is not a multiple of {}",
            plaintext.len(),
            AES_BLOCK_SIZE
        )));
    }
    Ok(Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<NoPadding>(plaintext))
}

/// Decrypt AES-256-CBC `ciphertext`.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if the input is empty, not block
/// aligned, or rejected by the cipher.
pub fn aes256_cbc_decrypt(
    key: &[u8; 32],
    iv: &[u8; AES_BLOCK_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::DecryptionFailed(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            AES_BLOCK_SIZE
        )));
    }
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
