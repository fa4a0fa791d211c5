//! # Verifiable Random Function (secp256k1)
//!
//! Discrete-log equality proof over a try-and-increment hash to curve.
//!
//! ```text
//! H     = hash_to_curve(seed)
//! vrf   = [k]H                         (65 bytes, uncompressed)
//! s     = hash_to_int(G, H, [k]G, vrf, [r]G, [r]H)
//! t     = r - s*k  (mod n)
//! proof = s (32) ‖ t (32) ‖ vrf (65)
//! index = SHA-256(vrf)
//! ```
//!
//! Verification recomputes `[t]G + [s]PK` and `[t]H + [s]vrf`, which equal
//! `[r]G` and `[r]H` for an honest proof, and checks `s`.

use crate::CryptoError;
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey, Scalar};
use sha2::{Digest, Sha256};

/// Length of a proof: `s ‖ t ‖ vrf`.
pub const VRF_PROOF_LENGTH: usize = 32 + 32 + 65;

const HASH_TO_CURVE_ATTEMPTS: u32 = 100;

/// Evaluate the VRF at `seed` under `key`, returning `(index, proof)`.
pub fn vrf_evaluate(key: &SigningKey, seed: &[u8]) -> Result<([u8; 32], Vec<u8>), CryptoError> {
    let k: Scalar = *key.as_nonzero_scalar().as_ref();
    let r: Scalar = *NonZeroScalar::random(&mut rand::rngs::OsRng).as_ref();

    let h = hash_to_curve(seed)?;
    let pk = ProjectivePoint::from(*key.verifying_key().as_affine());
    let vrf = encode(&(h * k))?;

    let mut transcript = Vec::with_capacity(6 * 65);
    transcript.extend_from_slice(&encode(&ProjectivePoint::GENERATOR)?);
    transcript.extend_from_slice(&encode(&h)?);
    transcript.extend_from_slice(&encode(&pk)?);
    transcript.extend_from_slice(&vrf);
    transcript.extend_from_slice(&encode(&(ProjectivePoint::GENERATOR * r))?);
    transcript.extend_from_slice(&encode(&(h * r))?);
    let s = hash_to_int(&transcript);

    let t = r - s * k;

    let mut proof = Vec::with_capacity(VRF_PROOF_LENGTH);
    proof.extend_from_slice(&s.to_bytes());
    proof.extend_from_slice(&t.to_bytes());
    proof.extend_from_slice(&vrf);

    Ok((Sha256::digest(vrf).into(), proof))
}

/// Verify `proof` for `seed` under `key` and return the VRF index.
///
/// # Errors
///
/// `InvalidVrfProof` for malformed or non-verifying proofs.
pub fn vrf_proof_to_hash(
    key: &VerifyingKey,
    seed: &[u8],
    proof: &[u8],
) -> Result<[u8; 32], CryptoError> {
    if proof.len() != VRF_PROOF_LENGTH {
        return Err(CryptoError::InvalidVrfProof);
    }
    let s = scalar_from_slice(&proof[0..32])?;
    let t = scalar_from_slice(&proof[32..64])?;
    let vrf_bytes = &proof[64..];
    let vrf = PublicKey::from_sec1_bytes(vrf_bytes)
        .map_err(|_| CryptoError::InvalidVrfProof)?
        .to_projective();

    let h = hash_to_curve(seed)?;
    let pk = ProjectivePoint::from(*key.as_affine());

    let u = ProjectivePoint::GENERATOR * t + pk * s;
    let v = h * t + vrf * s;

    let mut transcript = Vec::with_capacity(6 * 65);
    transcript.extend_from_slice(&encode(&ProjectivePoint::GENERATOR)?);
    transcript.extend_from_slice(&encode(&h)?);
    transcript.extend_from_slice(&encode(&pk)?);
    transcript.extend_from_slice(vrf_bytes);
    transcript.extend_from_slice(&encode(&u)?);
    transcript.extend_from_slice(&encode(&v)?);

    if hash_to_int(&transcript) != s {
        return Err(CryptoError::InvalidVrfProof);
    }
    Ok(Sha256::digest(vrf_bytes).into())
}

/// Try-and-increment: `0x02 ‖ SHA-256(i ‖ m)` until it decodes as a point.
fn hash_to_curve(m: &[u8]) -> Result<ProjectivePoint, CryptoError> {
    for i in 0..HASH_TO_CURVE_ATTEMPTS {
        let mut hasher = Sha256::new();
        hasher.update(i.to_be_bytes());
        hasher.update(m);
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        compressed[1..].copy_from_slice(&hasher.finalize());

        if let Ok(point) = PublicKey::from_sec1_bytes(&compressed) {
            return Ok(point.to_projective());
        }
    }
    Err(CryptoError::HashToCurveFailed)
}

/// Simple discard method into `[1, n-1]`.
fn hash_to_int(m: &[u8]) -> Scalar {
    let mut i: u32 = 0;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(i.to_be_bytes());
        hasher.update(m);
        let digest = hasher.finalize();
        let candidate: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(&digest)).into();
        if let Some(k) = candidate {
            let shifted = k + Scalar::ONE;
            if !bool::from(shifted.is_zero()) {
                return shifted;
            }
        }
        i = i.wrapping_add(1);
    }
}

fn scalar_from_slice(bytes: &[u8]) -> Result<Scalar, CryptoError> {
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
        .ok_or(CryptoError::InvalidVrfProof)
}

fn encode(point: &ProjectivePoint) -> Result<[u8; 65], CryptoError> {
    let encoded = point.to_affine().to_encoded_point(false);
    let bytes = encoded.as_bytes();
    if bytes.len() != 65 {
        return Err(CryptoError::InvalidInput("point at infinity".to_string()));
    }
    let mut out = [0u8; 65];
    out.copy_from_slice(bytes);
    Ok(out)
}
