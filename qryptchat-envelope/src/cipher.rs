//! Single-recipient cipher: the core `encrypt_for` / `decrypt` pair.
//!
//! `decrypt` never propagates a `Decryption` error to its caller; every
//! failure path on the decrypt side resolves to one of the stable
//! user-facing strings so a message list can render without throwing.

use zeroize::Zeroize;

use crate::envelope::{self, EnvelopeFields};
use crate::error::{EngineError, ErrorKind};
use crate::hygiene;
use crate::kem::{self, KemAlgorithm, PublicKey, SecretKey};
use crate::primitives::{self, KEY_LEN, NONCE_LEN, SALT_LEN};

const HKDF_CONTEXT: &str = "ChaCha20-Poly1305";

pub const FMT_FORMAT_ERROR: &str = "[Encrypted message - format error]";
pub const FMT_DECRYPTION_FAILED: &str = "[Encrypted message - decryption failed]";
pub const FMT_NO_SUPPORTED_ALG: &str =
    "[Encrypted message - could not decrypt with any supported algorithm]";
pub const FMT_LEGACY_UNSUPPORTED: &str = "[Legacy encrypted message - please delete]";

/// Encrypt `plaintext` for a single recipient, given their base64 public
/// key candidate (run through C4 hygiene first).
pub fn encrypt_for(recipient_pk_b64: &str, plaintext: &str) -> Result<String, EngineError> {
    let (pk_bytes, alg) = hygiene::sanitize_public_key(recipient_pk_b64)?;
    let pk = PublicKey::from_bytes(alg, pk_bytes)?;

    let (kem_ct, mut ss) = kem::encapsulate(&pk)?;

    let salt = primitives::random_bytes(SALT_LEN)?;
    let mut key_buf = primitives::hkdf_sha256(&ss, &salt, HKDF_CONTEXT, KEY_LEN)?;
    let key: [u8; KEY_LEN] = key_buf
        .as_slice()
        .try_into()
        .map_err(|_| EngineError::new(ErrorKind::Encryption))?;

    let nonce_buf = primitives::random_bytes(NONCE_LEN)?;
    let nonce: [u8; NONCE_LEN] = nonce_buf
        .as_slice()
        .try_into()
        .map_err(|_| EngineError::new(ErrorKind::Encryption))?;

    let ct = primitives::aead_seal(&key, &nonce, plaintext.as_bytes(), b"");

    ss.zeroize();
    key_buf.zeroize();

    let ct = ct?;
    let time_ms = current_unix_ms();

    envelope::encode(alg, &kem_ct, &salt, &nonce, &ct, time_ms)
}

/// Decrypt an envelope string using the resolver's key material.
///
/// `resolve` must return the secret key for the requested algorithm, or
/// `None` if the caller has no key pair for that algorithm at all (this
/// is distinct from decapsulation failure).
pub fn decrypt(envelope_str: &str, resolve: impl Fn(KemAlgorithm) -> Option<SecretKey>) -> String {
    let fields = match envelope::decode(envelope_str) {
        Ok(fields) => fields,
        Err(e) => {
            return match e.kind() {
                ErrorKind::NotCiphertext => envelope_str.to_string(),
                ErrorKind::LegacyUnsupported => FMT_LEGACY_UNSUPPORTED.to_string(),
                _ => FMT_FORMAT_ERROR.to_string(),
            };
        }
    };

    let candidates: Vec<KemAlgorithm> = match fields.alg {
        Some(alg) => vec![alg],
        None => vec![KemAlgorithm::Primary, KemAlgorithm::Legacy],
    };

    for alg in &candidates {
        let Some(sk) = resolve(*alg) else {
            continue;
        };
        if let Some(plaintext) = try_open(&fields, &sk) {
            return plaintext;
        }
    }

    if fields.alg.is_some() {
        FMT_DECRYPTION_FAILED.to_string()
    } else {
        FMT_NO_SUPPORTED_ALG.to_string()
    }
}

fn try_open(fields: &EnvelopeFields, sk: &SecretKey) -> Option<String> {
    let mut ss = kem::decapsulate(sk, &fields.kem_ct).ok()?;
    let mut key_buf = primitives::hkdf_sha256(&ss, &fields.salt, HKDF_CONTEXT, KEY_LEN).ok()?;
    let key: [u8; KEY_LEN] = key_buf.as_slice().try_into().ok()?;
    let nonce: [u8; NONCE_LEN] = fields.nonce.as_slice().try_into().ok()?;

    let plaintext = primitives::aead_open(&key, &nonce, &fields.aead_ct, b"");

    ss.zeroize();
    key_buf.zeroize();

    let plaintext = plaintext.ok()?;
    String::from_utf8(plaintext).ok()
}

fn current_unix_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(alg: KemAlgorithm) -> (String, SecretKey) {
        let (pk, sk) = kem::generate_keypair(alg);
        let pk_b64 = base64::encode(pk.as_bytes());
        (pk_b64, sk)
    }

    #[test]
    fn roundtrip_primary() {
        let (pk_b64, sk) = setup(KemAlgorithm::Primary);
        let envelope = encrypt_for(&pk_b64, "hello").unwrap();
        let out = decrypt(&envelope, |alg| {
            (alg == KemAlgorithm::Primary).then(|| {
                let bytes = sk.as_bytes().to_vec();
                SecretKey::from_bytes(alg, bytes).unwrap()
            })
        });
        assert_eq!(out, "hello");
    }

    #[test]
    fn roundtrip_legacy_unicode() {
        let (pk_b64, sk) = setup(KemAlgorithm::Legacy);
        let envelope = encrypt_for(&pk_b64, "привет").unwrap();
        let out = decrypt(&envelope, |alg| {
            (alg == KemAlgorithm::Legacy).then(|| {
                let bytes = sk.as_bytes().to_vec();
                SecretKey::from_bytes(alg, bytes).unwrap()
            })
        });
        assert_eq!(out, "привет");
    }

    #[test]
    fn two_encryptions_of_same_message_differ() {
        let (pk_b64, _sk) = setup(KemAlgorithm::Primary);
        let a = encrypt_for(&pk_b64, "same message").unwrap();
        let b = encrypt_for(&pk_b64, "same message").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_passthrough() {
        let out = decrypt("hello world", |_| None);
        assert_eq!(out, "hello world");
    }

    #[test]
    fn tampered_ciphertext_fails_cleanly() {
        let (pk_b64, sk) = setup(KemAlgorithm::Primary);
        let envelope = encrypt_for(&pk_b64, "hello").unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&envelope).unwrap();
        let c = value["c"].as_str().unwrap();
        let mut raw = base64::decode(c).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        value["c"] = serde_json::Value::String(base64::encode(&raw));
        let tampered = serde_json::to_string(&value).unwrap();

        let out = decrypt(&tampered, |alg| {
            (alg == KemAlgorithm::Primary).then(|| {
                let bytes = sk.as_bytes().to_vec();
                SecretKey::from_bytes(alg, bytes).unwrap()
            })
        });
        assert_eq!(out, FMT_DECRYPTION_FAILED);
    }

    #[test]
    fn no_resident_key_for_known_alg_fails_cleanly() {
        let (pk_b64, _sk) = setup(KemAlgorithm::Primary);
        let envelope = encrypt_for(&pk_b64, "hello").unwrap();
        let out = decrypt(&envelope, |_alg| None);
        assert_eq!(out, FMT_DECRYPTION_FAILED);
    }

    #[test]
    fn unknown_alg_tries_both_then_fails() {
        let (pk_b64, _sk) = setup(KemAlgorithm::Primary);
        let envelope = encrypt_for(&pk_b64, "hello").unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&envelope).unwrap();
        value.as_object_mut().unwrap().remove("alg");
        let unknown_alg_envelope = serde_json::to_string(&value).unwrap();

        let (_legacy_pk, legacy_sk) = kem::generate_keypair(KemAlgorithm::Legacy);
        let out = decrypt(&unknown_alg_envelope, |alg| {
            (alg == KemAlgorithm::Legacy).then(|| {
                let bytes = legacy_sk.as_bytes().to_vec();
                SecretKey::from_bytes(alg, bytes).unwrap()
            })
        });
        assert_eq!(out, FMT_NO_SUPPORTED_ALG);
    }
}
