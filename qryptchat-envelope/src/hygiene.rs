//! Public-key hygiene: tolerant parsing of externally supplied public keys.
//!
//! A tiny amount of protocol drift (a stray padding byte, a truncated
//! base64 string) must not silently corrupt ciphertexts, so candidates go
//! through header-stripping, near-size normalization, and a structural
//! corruption heuristic before they're handed to the KEM.

use crate::error::{EngineError, ErrorKind};
use crate::kem::{KemAlgorithm, LEGACY_PK_BYTES, PRIMARY_PK_BYTES};
use crate::primitives::b64_decode;

/// A legacy textual header (`KYBER`) from an earlier, incompatible scheme.
const KYBER_HEADER: &[u8] = b"KYBER";

/// Compatibility concession: how far off `pk_size` a candidate may be and
/// still get padded/truncated to size. Padding a key that was merely
/// truncated is unsound (the KEM call will succeed pseudo-randomly but no
/// peer can decapsulate), so every trigger is logged at warn level.
const NEAR_SIZE_TOLERANCE: usize = 32;

/// Structural corruption heuristic: in the first `STRUCTURAL_WINDOW` bytes,
/// `STRUCTURAL_ZERO_THRESHOLD` or more zero bytes is treated as corruption.
const STRUCTURAL_WINDOW: usize = 50;
const STRUCTURAL_ZERO_THRESHOLD: usize = 40;

/// Decode and sanitize a base64 public-key candidate. Returns the usable
/// key bytes and the algorithm they were normalized against.
pub fn sanitize_public_key(candidate_b64: &str) -> Result<(Vec<u8>, KemAlgorithm), EngineError> {
    let bytes = b64_decode(candidate_b64)
        .map_err(|_| EngineError::new(ErrorKind::InvalidPublicKey))?;

    if bytes.starts_with(KYBER_HEADER) {
        tracing::warn!("rejecting legacy KYBER-header public key as incompatible");
        return Err(EngineError::new(ErrorKind::IncompatibleKey));
    }

    let normalized = normalize_size(bytes)?;
    let alg = detect_algorithm(normalized.len())
        .ok_or_else(|| EngineError::new(ErrorKind::InvalidPublicKey))?;

    if is_structurally_corrupt(&normalized) {
        return Err(EngineError::new(ErrorKind::InvalidPublicKey));
    }

    Ok((normalized, alg))
}

fn normalize_size(mut bytes: Vec<u8>) -> Result<Vec<u8>, EngineError> {
    if bytes.len() == PRIMARY_PK_BYTES || bytes.len() == LEGACY_PK_BYTES {
        return Ok(bytes);
    }

    let primary_delta = abs_diff(bytes.len(), PRIMARY_PK_BYTES);
    let legacy_delta = abs_diff(bytes.len(), LEGACY_PK_BYTES);

    let (target, delta) = if primary_delta <= legacy_delta {
        (PRIMARY_PK_BYTES, primary_delta)
    } else {
        (LEGACY_PK_BYTES, legacy_delta)
    };

    if delta > NEAR_SIZE_TOLERANCE {
        return Err(EngineError::with_detail(
            ErrorKind::InvalidPublicKey,
            format!("size {} is not within tolerance of {}", bytes.len(), target),
        ));
    }

    tracing::warn!(
        from_len = bytes.len(),
        to_len = target,
        "padding/truncating near-size public key"
    );

    bytes.resize(target, 0);
    Ok(bytes)
}

fn detect_algorithm(len: usize) -> Option<KemAlgorithm> {
    match len {
        PRIMARY_PK_BYTES => Some(KemAlgorithm::Primary),
        LEGACY_PK_BYTES => Some(KemAlgorithm::Legacy),
        _ => None,
    }
}

fn is_structurally_corrupt(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(STRUCTURAL_WINDOW)];
    let zero_count = window.iter().filter(|b| **b == 0).count();
    zero_count >= STRUCTURAL_ZERO_THRESHOLD
}

fn abs_diff(a: usize, b: usize) -> usize {
    if a > b {
        a - b
    } else {
        b - a
    }
}
