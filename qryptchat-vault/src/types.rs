//! Core vault data model: the key pair a user holds per algorithm.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use qryptchat_envelope::KemAlgorithm;

/// A resident ML-KEM key pair for one algorithm slot.
#[derive(Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub private_key: Vec<u8>,
    pub algorithm: KemAlgorithm,
    pub created_at: DateTime<Utc>,
    pub version: u32,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("algorithm", &self.algorithm)
            .field("created_at", &self.created_at)
            .field("version", &self.version)
            .field("public_key_len", &self.public_key.len())
            .finish_non_exhaustive()
    }
}

/// Both algorithm slots together. The vault always keeps either both
/// resident or neither — there is no state where only one is loaded.
#[derive(Debug, Clone)]
pub struct UserKeyState {
    pub primary: KeyPair,
    pub legacy: KeyPair,
}

/// The storage key under which each algorithm's record is kept. These
/// match the historical names the data was first persisted under.
pub fn storage_key(algorithm: KemAlgorithm) -> &'static str {
    match algorithm {
        KemAlgorithm::Primary => "qryptchat_pq_keypair",
        KemAlgorithm::Legacy => "qryptchat_pq_keypair_768",
    }
}
