//! KEM adapter: a uniform interface over the two supported ML-KEM (FIPS 203)
//! parameter sets.
//!
//! `Primary` binds to ML-KEM-1024 (≈NIST level 5); `Legacy` binds to
//! ML-KEM-768 (≈NIST level 3), kept alive so the engine can still decrypt
//! traffic encrypted against an older published public key. No classical
//! KEM is combined in; this binds directly to the post-quantum primitive.

use ml_kem::{
    kem::{Decapsulate, Encapsulate},
    EncodedSizeUser, KemCore, MlKem1024, MlKem1024Params, MlKem768, MlKem768Params,
};
use rand_core::OsRng;
use zeroize::Zeroizing;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};

/// The two supported KEM parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KemAlgorithm {
    /// ML-KEM-1024, ≈NIST security level 5.
    Primary,
    /// ML-KEM-768, ≈NIST security level 3. Kept for backward compatibility.
    Legacy,
}

impl KemAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            KemAlgorithm::Primary => "Primary",
            KemAlgorithm::Legacy => "Legacy",
        }
    }

    pub const fn pk_size(&self) -> usize {
        match self {
            KemAlgorithm::Primary => PRIMARY_PK_BYTES,
            KemAlgorithm::Legacy => LEGACY_PK_BYTES,
        }
    }

    pub const fn sk_size(&self) -> usize {
        match self {
            KemAlgorithm::Primary => PRIMARY_SK_BYTES,
            KemAlgorithm::Legacy => LEGACY_SK_BYTES,
        }
    }

    pub const fn ct_size(&self) -> usize {
        match self {
            KemAlgorithm::Primary => PRIMARY_CT_BYTES,
            KemAlgorithm::Legacy => LEGACY_CT_BYTES,
        }
    }

    pub const fn ss_size(&self) -> usize {
        SHARED_SECRET_BYTES
    }

    /// Parse from the textual name carried in an envelope's `alg` field.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Primary" => Some(KemAlgorithm::Primary),
            "Legacy" => Some(KemAlgorithm::Legacy),
            _ => None,
        }
    }
}

impl std::fmt::Display for KemAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub const PRIMARY_PK_BYTES: usize = 1568;
pub const PRIMARY_SK_BYTES: usize = 3168;
pub const PRIMARY_CT_BYTES: usize = 1568;

pub const LEGACY_PK_BYTES: usize = 1184;
pub const LEGACY_SK_BYTES: usize = 2400;
pub const LEGACY_CT_BYTES: usize = 1088;

pub const SHARED_SECRET_BYTES: usize = 32;

/// An opaque public key: raw, already size-validated encapsulation key bytes
/// plus the algorithm they belong to.
#[derive(Clone)]
pub struct PublicKey {
    alg: KemAlgorithm,
    bytes: Vec<u8>,
}

impl PublicKey {
    pub fn from_bytes(alg: KemAlgorithm, bytes: Vec<u8>) -> Result<Self, EngineError> {
        if bytes.len() != alg.pk_size() {
            return Err(EngineError::new(ErrorKind::InvalidPublicKey));
        }
        Ok(Self { alg, bytes })
    }

    pub fn algorithm(&self) -> KemAlgorithm {
        self.alg
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An opaque secret key. Never serialized except by the key vault's own
/// storage path; callers of the cipher only ever see a handle.
#[derive(Clone)]
pub struct SecretKey {
    alg: KemAlgorithm,
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    pub fn from_bytes(alg: KemAlgorithm, bytes: Vec<u8>) -> Result<Self, EngineError> {
        if bytes.len() != alg.sk_size() {
            return Err(EngineError::new(ErrorKind::InvalidKey));
        }
        Ok(Self {
            alg,
            bytes: Zeroizing::new(bytes),
        })
    }

    pub fn algorithm(&self) -> KemAlgorithm {
        self.alg
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Generate a fresh key pair for `alg`.
pub fn generate_keypair(alg: KemAlgorithm) -> (PublicKey, SecretKey) {
    match alg {
        KemAlgorithm::Primary => {
            let (dk, ek) = MlKem1024::generate(&mut OsRng);
            (
                PublicKey {
                    alg,
                    bytes: ek.as_bytes().to_vec(),
                },
                SecretKey {
                    alg,
                    bytes: Zeroizing::new(dk.as_bytes().to_vec()),
                },
            )
        }
        KemAlgorithm::Legacy => {
            let (dk, ek) = MlKem768::generate(&mut OsRng);
            (
                PublicKey {
                    alg,
                    bytes: ek.as_bytes().to_vec(),
                },
                SecretKey {
                    alg,
                    bytes: Zeroizing::new(dk.as_bytes().to_vec()),
                },
            )
        }
    }
}

/// Encapsulate against `pk`, returning `(kem_ciphertext, shared_secret)`.
/// Fails with `InvalidPublicKey` if `pk`'s bytes cannot be parsed as an
/// encapsulation key of its algorithm's parameter set.
pub fn encapsulate(pk: &PublicKey) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>), EngineError> {
    match pk.alg {
        KemAlgorithm::Primary => {
            let arr: [u8; PRIMARY_PK_BYTES] = pk
                .bytes
                .as_slice()
                .try_into()
                .map_err(|_| EngineError::new(ErrorKind::InvalidPublicKey))?;
            let ek = ml_kem::kem::EncapsulationKey::<MlKem1024Params>::from_bytes(&arr.into());
            let (ct, ss) = ek
                .encapsulate(&mut OsRng)
                .map_err(|_| EngineError::new(ErrorKind::InvalidPublicKey))?;
            Ok((ct.to_vec(), Zeroizing::new(ss.to_vec())))
        }
        KemAlgorithm::Legacy => {
            let arr: [u8; LEGACY_PK_BYTES] = pk
                .bytes
                .as_slice()
                .try_into()
                .map_err(|_| EngineError::new(ErrorKind::InvalidPublicKey))?;
            let ek = ml_kem::kem::EncapsulationKey::<MlKem768Params>::from_bytes(&arr.into());
            let (ct, ss) = ek
                .encapsulate(&mut OsRng)
                .map_err(|_| EngineError::new(ErrorKind::InvalidPublicKey))?;
            Ok((ct.to_vec(), Zeroizing::new(ss.to_vec())))
        }
    }
}

/// Decapsulate `kem_ct` under `sk`. ML-KEM is implicit-rejection safe: a
/// malformed or wrong ciphertext yields a pseudo-random shared secret
/// rather than an error, so the subsequent AEAD open fails cleanly instead
/// of this function returning `Err`. `Err` here only signals a ciphertext
/// that does not even parse to the expected length.
pub fn decapsulate(sk: &SecretKey, kem_ct: &[u8]) -> Result<Zeroizing<Vec<u8>>, EngineError> {
    if kem_ct.len() != sk.alg.ct_size() {
        return Err(EngineError::decryption());
    }
    match sk.alg {
        KemAlgorithm::Primary => {
            let dk_arr: [u8; PRIMARY_SK_BYTES] = sk
                .bytes
                .as_slice()
                .try_into()
                .map_err(|_| EngineError::decryption())?;
            let dk = ml_kem::kem::DecapsulationKey::<MlKem1024Params>::from_bytes(&dk_arr.into());
            let ct_arr = ml_kem::Ciphertext::<MlKem1024>::try_from(kem_ct)
                .map_err(|_| EngineError::decryption())?;
            let ss = dk.decapsulate(&ct_arr).map_err(|_| EngineError::decryption())?;
            Ok(Zeroizing::new(ss.to_vec()))
        }
        KemAlgorithm::Legacy => {
            let dk_arr: [u8; LEGACY_SK_BYTES] = sk
                .bytes
                .as_slice()
                .try_into()
                .map_err(|_| EngineError::decryption())?;
            let dk = ml_kem::kem::DecapsulationKey::<MlKem768Params>::from_bytes(&dk_arr.into());
            let ct_arr = ml_kem::Ciphertext::<MlKem768>::try_from(kem_ct)
                .map_err(|_| EngineError::decryption())?;
            let ss = dk.decapsulate(&ct_arr).map_err(|_| EngineError::decryption())?;
            Ok(Zeroizing::new(ss.to_vec()))
        }
    }
}
