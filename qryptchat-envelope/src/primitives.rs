//! Base primitives: RNG, HKDF, AEAD, constant-time compare, zeroization.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{EngineError, ErrorKind};

/// Fixed domain tag prepended to every HKDF `info` string.
const DOMAIN_TAG: &str = "QryptChat-v1-";

/// AEAD key length (ChaCha20-Poly1305, 256-bit key).
pub const KEY_LEN: usize = 32;
/// AEAD nonce length.
pub const NONCE_LEN: usize = 12;
/// HKDF salt length used throughout the envelope scheme.
pub const SALT_LEN: usize = 32;

/// Standard (non-URL-safe) base64 encode, the one citable implementation of
/// this scheme's `b64_encode` operation; every wire-format field that carries
/// raw bytes goes through this.
pub fn b64_encode(bytes: impl AsRef<[u8]>) -> String {
    base64::encode(bytes)
}

/// Standard base64 decode. Callers choose which [`ErrorKind`] a malformed
/// input maps to, since the right kind depends on which field failed.
pub fn b64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::decode(s)
}

/// Fill `n` cryptographically random bytes.
pub fn random_bytes(n: usize) -> Result<Zeroizing<Vec<u8>>, EngineError> {
    let mut buf = Zeroizing::new(vec![0u8; n]);
    getrandom::getrandom(&mut buf)
        .map_err(|_| EngineError::with_detail(ErrorKind::Encryption, "rng failure"))?;
    Ok(buf)
}

/// Compiler-resistant wipe of a buffer. Prefer [`Zeroizing`] wrappers over
/// manual calls to this where the value's lifetime allows it; this exists
/// for buffers that must be reused in place.
pub fn secure_zero(buf: &mut [u8]) {
    use zeroize::Zeroize;
    buf.zeroize();
}

/// Constant-time byte comparison. Runtime does not depend on the position
/// of the first differing byte.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// HKDF-SHA256 with the fixed domain tag prepended to `context`.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    context: &str,
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, EngineError> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    let mut info = String::with_capacity(DOMAIN_TAG.len() + context.len());
    info.push_str(DOMAIN_TAG);
    info.push_str(context);
    hk.expand(info.as_bytes(), &mut okm)
        .map_err(|_| EngineError::with_detail(ErrorKind::Encryption, "hkdf expand failed"))?;
    Ok(okm)
}

/// AEAD seal. `key` must be [`KEY_LEN`] bytes, `nonce` [`NONCE_LEN`] bytes.
pub fn aead_seal(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EngineError> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| EngineError::new(ErrorKind::Encryption))?;
    let n = Nonce::from_slice(nonce);
    cipher
        .encrypt(n, Payload { msg: plaintext, aad })
        .map_err(|_| EngineError::new(ErrorKind::Encryption))
}

/// AEAD open. On tag mismatch this returns the single canonical
/// `Decryption` error: never a partial plaintext, never a distinguishable
/// failure reason.
pub fn aead_open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EngineError> {
    let cipher =
        ChaCha20Poly1305::new_from_slice(key).map_err(|_| EngineError::decryption())?;
    let n = Nonce::from_slice(nonce);
    cipher
        .decrypt(n, Payload { msg: ciphertext, aad })
        .map_err(|_| EngineError::decryption())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_roundtrip() {
        let key = [7u8; KEY_LEN];
        let nonce = [9u8; NONCE_LEN];
        let ct = aead_seal(&key, &nonce, b"hello", b"").unwrap();
        let pt = aead_open(&key, &nonce, &ct, b"").unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn aead_open_rejects_tamper() {
        let key = [1u8; KEY_LEN];
        let nonce = [2u8; NONCE_LEN];
        let mut ct = aead_seal(&key, &nonce, b"hello", b"").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0x01;
        let err = aead_open(&key, &nonce, &ct, b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decryption);
        assert!(err.detail().is_none());
    }

    #[test]
    fn b64_round_trips() {
        let bytes = [5u8, 200, 0, 255, 17];
        let encoded = b64_encode(bytes);
        assert_eq!(b64_decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn ct_eq_matches_and_differs() {
        assert!(ct_eq(b"abcd", b"abcd"));
        assert!(!ct_eq(b"abcd", b"abce"));
        assert!(!ct_eq(b"abcd", b"abc"));
    }

    #[test]
    fn hkdf_is_deterministic_for_same_inputs() {
        let a = hkdf_sha256(b"ikm", b"salt-salt-salt-salt-salt-salt32", "ctx", 32).unwrap();
        let b = hkdf_sha256(b"ikm", b"salt-salt-salt-salt-salt-salt32", "ctx", 32).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn hkdf_context_changes_output() {
        let salt = b"salt-salt-salt-salt-salt-salt32";
        let a = hkdf_sha256(b"ikm", salt, "ctx-a", 32).unwrap();
        let b = hkdf_sha256(b"ikm", salt, "ctx-b", 32).unwrap();
        assert_ne!(*a, *b);
    }
}
