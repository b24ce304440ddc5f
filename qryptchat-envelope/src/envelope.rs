//! Envelope v3: the canonical on-wire ciphertext record.
//!
//! ```json
//! { "v": 3, "alg": "Primary", "kem": "...", "s": "...", "n": "...", "c": "...", "t": 1690000000000 }
//! ```
//!
//! Decoding accepts the historical long-form field names as aliases;
//! encoding always emits the short canonical names only.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};
use crate::kem::KemAlgorithm;
use crate::primitives::{b64_decode, b64_encode};

const ENVELOPE_VERSION: u32 = 3;

const FALLBACK_TAGS: &[&str] = &["FALLBACK-AES", "FALLBACK-AES-GCM"];

/// On-wire envelope, deserialized permissively (aliases accepted) and
/// serialized strictly (canonical names only).
#[derive(Debug, Clone, Deserialize)]
struct WireEnvelope {
    v: u32,
    #[serde(default, alias = "algorithm")]
    alg: Option<String>,
    #[serde(alias = "kemCiphertext")]
    kem: Option<String>,
    #[serde(alias = "salt")]
    s: Option<String>,
    #[serde(alias = "nonce")]
    n: Option<String>,
    #[serde(alias = "ciphertext")]
    c: Option<String>,
    t: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
struct CanonicalEnvelope<'a> {
    v: u32,
    alg: &'a str,
    kem: String,
    s: String,
    n: String,
    c: String,
    t: i64,
}

/// A successfully decoded envelope whose fields are all present. `alg` is
/// `None` when the field was absent or unrecognized but the other five
/// required fields all parsed — the caller must then try each known
/// algorithm in turn.
#[derive(Debug, Clone)]
pub struct EnvelopeFields {
    pub alg: Option<KemAlgorithm>,
    pub kem_ct: Vec<u8>,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub aead_ct: Vec<u8>,
    pub time_ms: i64,
}

/// Encode an envelope, emitting only canonical short field names.
pub fn encode(
    alg: KemAlgorithm,
    kem_ct: &[u8],
    salt: &[u8],
    nonce: &[u8],
    aead_ct: &[u8],
    time_ms: i64,
) -> Result<String, EngineError> {
    let env = CanonicalEnvelope {
        v: ENVELOPE_VERSION,
        alg: alg.name(),
        kem: b64_encode(kem_ct),
        s: b64_encode(salt),
        n: b64_encode(nonce),
        c: b64_encode(aead_ct),
        t: time_ms,
    };
    serde_json::to_string(&env)
        .map_err(|_| EngineError::new(ErrorKind::Encryption))
}

/// Decode a wire string into envelope fields, or a sentinel/error per the
/// dispatch rules: not-JSON, missing-fields, and deprecated fallback tags
/// are distinguished so the caller can render the right placeholder.
pub fn decode(input: &str) -> Result<EnvelopeFields, EngineError> {
    // Is it JSON at all? A plain chat message routes to NotCiphertext so
    // the caller can treat it as plaintext/legacy history.
    let value: serde_json::Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(_) => return Err(EngineError::new(ErrorKind::NotCiphertext)),
    };

    let wire: WireEnvelope = match serde_json::from_value(value) {
        Ok(w) => w,
        Err(_) => return Err(EngineError::new(ErrorKind::FormatError)),
    };

    if wire.v != ENVELOPE_VERSION {
        return Err(EngineError::new(ErrorKind::FormatError));
    }

    if let Some(tag) = wire.alg.as_deref() {
        if FALLBACK_TAGS.contains(&tag) {
            return Err(EngineError::new(ErrorKind::LegacyUnsupported));
        }
    }

    let (kem, s, n, c, t) = match (wire.kem, wire.s, wire.n, wire.c, wire.t) {
        (Some(kem), Some(s), Some(n), Some(c), Some(t)) => (kem, s, n, c, t),
        _ => return Err(EngineError::new(ErrorKind::FormatError)),
    };

    let kem_ct = b64_decode(&kem).map_err(|_| EngineError::new(ErrorKind::FormatError))?;
    let salt = b64_decode(&s).map_err(|_| EngineError::new(ErrorKind::FormatError))?;
    let nonce = b64_decode(&n).map_err(|_| EngineError::new(ErrorKind::FormatError))?;
    let aead_ct = b64_decode(&c).map_err(|_| EngineError::new(ErrorKind::FormatError))?;

    let alg = match wire.alg.as_deref() {
        Some(name) => KemAlgorithm::from_name(name),
        None => None,
    };

    Ok(EnvelopeFields {
        alg,
        kem_ct,
        salt,
        nonce,
        aead_ct,
        time_ms: t,
    })
}
