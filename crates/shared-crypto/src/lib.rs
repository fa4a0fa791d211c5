//! # Shared Crypto - Node Core Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 (recoverable) | Witness signatures, address recovery |
//! | `vrf` | secp256k1 + SHA-256 | Verifiable election randomness |
//! | `symmetric` | AES-256-CBC | Wallet file encryption |
//! | `kdf` | scrypt | Wallet password stretching |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, low-S normalization
//! - **Secrets**: key material is zeroized on drop

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod kdf;
pub mod symmetric;
pub mod vrf;

// Re-exports
pub use ecdsa::{recover_address, recover_public_key, Secp256k1KeyPair};
pub use errors::CryptoError;
pub use kdf::{scrypt_derive, ScryptParams};
pub use symmetric::{aes256_cbc_decrypt, aes256_cbc_encrypt, AES_BLOCK_SIZE};
pub use vrf::{vrf_evaluate, vrf_proof_to_hash, VRF_PROOF_LENGTH};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
