//! # Password Key Derivation
//!
//! scrypt with explicit, file-persisted parameters.

use crate::CryptoError;
use zeroize::Zeroizing;

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScryptParams {
    /// CPU/memory cost; must be a power of two greater than one.
    pub n: u32,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
    /// Output length in bytes.
    pub key_len: usize,
}

impl ScryptParams {
    /// Light parameters: about 4 MB of memory and ~100 ms of CPU.
    pub const LIGHT: Self = Self {
        n: 1 << 12,
        r: 8,
        p: 6,
        key_len: 32,
    };

    /// Standard parameters: about 256 MB of memory and ~1 s of CPU.
    pub const STANDARD: Self = Self {
        n: 1 << 18,
        r: 8,
        p: 1,
        key_len: 32,
    };
}

/// Derive `params.key_len` bytes from `password` and `salt`.
///
/// # Errors
///
/// `InvalidKdfParameter` when `n` is not a power of two or the parameter set
/// is rejected; `KeyDerivationFailed` when scrypt itself fails.
pub fn scrypt_derive(
    password: &[u8],
    salt: &[u8],
    params: &ScryptParams,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if params.n < 2 || !params.n.is_power_of_two() {
        return Err(CryptoError::InvalidKdfParameter(format!(
            "n must be a power of two, got {}",
            params.n
        )));
    }
    let log_n = params.n.trailing_zeros() as u8;
    let scrypt_params = scrypt::Params::new(log_n, params.r, params.p, params.key_len)
        .map_err(|e| CryptoError::InvalidKdfParameter(e.to_string()))?;

    let mut out = Zeroizing::new(vec![0u8; params.key_len]);
    scrypt::scrypt(password, salt, &scrypt_params, &mut out)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    Ok(out)
}
