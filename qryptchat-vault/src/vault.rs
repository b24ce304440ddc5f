//! Key Vault: per-user dual key-pair lifecycle over a pluggable
//! [`StorageBackend`].
//!
//! `init` is idempotent and safe to call from multiple tasks; after that,
//! callers are expected to serialize access the way the rest of the engine
//! does (single-threaded per user).

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use qryptchat_envelope::primitives::{b64_decode, b64_encode};
use qryptchat_envelope::{kem, EngineError, ErrorKind, KemAlgorithm, SecretKey};

use crate::storage::{StorageBackend, StoredKeyRecord};
use crate::types::{storage_key, KeyPair, UserKeyState};

pub struct KeyVault {
    storage: Arc<dyn StorageBackend>,
    state: Mutex<Option<UserKeyState>>,
}

impl KeyVault {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            state: Mutex::new(None),
        }
    }

    /// Loads both key pairs from durable storage, generating and
    /// persisting any that are missing. Returns once both are resident.
    pub async fn init(&self) -> Result<(), EngineError> {
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let primary = self.load_or_generate(KemAlgorithm::Primary)?;
        let legacy = self.load_or_generate(KemAlgorithm::Legacy)?;

        tracing::debug!(primary_version = primary.version, legacy_version = legacy.version, "vault initialized");
        *guard = Some(UserKeyState { primary, legacy });
        Ok(())
    }

    /// Read-only base64 view of a resident public key, for sharing.
    pub async fn public_key(&self, algorithm: KemAlgorithm) -> Result<String, EngineError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or_else(|| EngineError::new(ErrorKind::InvalidKey))?;
        Ok(b64_encode(&self.select(state, algorithm).public_key))
    }

    /// Never exposed outside this crate's C6 integration point.
    pub(crate) async fn private_key(&self, algorithm: KemAlgorithm) -> Result<SecretKey, EngineError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or_else(|| EngineError::new(ErrorKind::InvalidKey))?;
        let kp = self.select(state, algorithm);
        SecretKey::from_bytes(algorithm, kp.private_key.clone())
    }

    /// Base64 export of both key pairs, for backup.
    pub async fn export_all(&self) -> Result<ExportedKeys, EngineError> {
        let guard = self.state.lock().await;
        let state = guard.as_ref().ok_or_else(|| EngineError::new(ErrorKind::InvalidKey))?;
        Ok(ExportedKeys {
            primary: encode_export(&state.primary),
            legacy: encode_export(&state.legacy),
        })
    }

    /// Replaces the resident pair for `algorithm` and persists it.
    pub async fn import(&self, public_key_b64: &str, private_key_b64: &str, algorithm: KemAlgorithm) -> Result<(), EngineError> {
        let public_key = b64_decode(public_key_b64)
            .map_err(|e| EngineError::with_detail(ErrorKind::InvalidKey, e.to_string()))?;
        let private_key = b64_decode(private_key_b64)
            .map_err(|e| EngineError::with_detail(ErrorKind::InvalidKey, e.to_string()))?;

        if public_key.len() != algorithm.pk_size() || private_key.len() != algorithm.sk_size() {
            return Err(EngineError::new(ErrorKind::InvalidKey));
        }

        let kp = KeyPair {
            public_key,
            private_key,
            algorithm,
            created_at: Utc::now(),
            version: 1,
        };
        self.persist(&kp)?;

        let mut guard = self.state.lock().await;
        let state = guard.as_mut().ok_or_else(|| EngineError::new(ErrorKind::InvalidKey))?;
        match algorithm {
            KemAlgorithm::Primary => state.primary = kp,
            KemAlgorithm::Legacy => state.legacy = kp,
        }
        tracing::debug!(?algorithm, "key pair imported");
        Ok(())
    }

    /// Zeroizes in-memory copies and deletes the durable entries.
    pub async fn wipe(&self) -> Result<(), EngineError> {
        use zeroize::Zeroize;

        let mut guard = self.state.lock().await;
        if let Some(mut state) = guard.take() {
            state.primary.private_key.zeroize();
            state.legacy.private_key.zeroize();
        }
        self.storage.delete(storage_key(KemAlgorithm::Primary))?;
        self.storage.delete(storage_key(KemAlgorithm::Legacy))?;
        tracing::debug!("vault wiped");
        Ok(())
    }

    fn select<'a>(&self, state: &'a UserKeyState, algorithm: KemAlgorithm) -> &'a KeyPair {
        match algorithm {
            KemAlgorithm::Primary => &state.primary,
            KemAlgorithm::Legacy => &state.legacy,
        }
    }

    fn load_or_generate(&self, algorithm: KemAlgorithm) -> Result<KeyPair, EngineError> {
        let key = storage_key(algorithm);
        match self.storage.get(key) {
            Ok(Some(record)) => match record_to_keypair(&record, algorithm) {
                Some(kp) => return Ok(kp),
                None => {
                    tracing::warn!(?algorithm, "resident key record algorithm mismatch, regenerating");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(?algorithm, error = %e, "storage read failed, regenerating");
            }
        }

        let (pk, sk) = kem::generate_keypair(algorithm);
        let kp = KeyPair {
            public_key: pk.as_bytes().to_vec(),
            private_key: sk.as_bytes().to_vec(),
            algorithm,
            created_at: Utc::now(),
            version: 1,
        };
        self.persist(&kp).map_err(|_| EngineError::new(ErrorKind::KeyGeneration))?;
        Ok(kp)
    }

    fn persist(&self, kp: &KeyPair) -> Result<(), EngineError> {
        let record = StoredKeyRecord {
            public_key: b64_encode(&kp.public_key),
            private_key: b64_encode(&kp.private_key),
            algorithm: kp.algorithm.name().to_string(),
            timestamp: kp.created_at.timestamp_millis(),
            version: kp.version,
        };
        self.storage.set(storage_key(kp.algorithm), &record)
    }
}

fn record_to_keypair(record: &StoredKeyRecord, expected: KemAlgorithm) -> Option<KeyPair> {
    if KemAlgorithm::from_name(&record.algorithm)? != expected {
        return None;
    }
    let public_key = b64_decode(&record.public_key).ok()?;
    let private_key = b64_decode(&record.private_key).ok()?;
    Some(KeyPair {
        public_key,
        private_key,
        algorithm: expected,
        created_at: chrono::DateTime::from_timestamp_millis(record.timestamp).unwrap_or_else(Utc::now),
        version: record.version,
    })
}

fn encode_export(kp: &KeyPair) -> ExportedKeyPair {
    ExportedKeyPair {
        public_key: b64_encode(&kp.public_key),
        private_key: b64_encode(&kp.private_key),
        algorithm: kp.algorithm.name().to_string(),
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExportedKeyPair {
    pub public_key: String,
    pub private_key: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExportedKeys {
    pub primary: ExportedKeyPair,
    pub legacy: ExportedKeyPair,
}
