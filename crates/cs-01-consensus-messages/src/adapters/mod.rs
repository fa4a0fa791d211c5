//! Adapters for the message ports

mod key_signer;

pub use key_signer::*;
