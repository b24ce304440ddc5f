//! Pluggable durable storage for the two resident key-pair records.
//!
//! The vault only ever needs one record per [`qryptchat_envelope::KemAlgorithm`]
//! variant, so the backend contract is a plain keyed get/set/delete rather
//! than the richer metadata-store shape a key hierarchy would need.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use qryptchat_envelope::{EngineError, ErrorKind};

/// On-disk/in-memory shape of a resident key pair record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredKeyRecord {
    pub public_key: String,
    pub private_key: String,
    pub algorithm: String,
    pub timestamp: i64,
    pub version: u32,
}

/// Synchronous so implementors don't need the `async_trait` dependency;
/// the vault wraps these calls in its own `async fn`s.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredKeyRecord>, EngineError>;
    fn set(&self, key: &str, record: &StoredKeyRecord) -> Result<(), EngineError>;
    fn delete(&self, key: &str) -> Result<(), EngineError>;
}

/// In-memory backend for tests and in-process embedding.
#[derive(Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, StoredKeyRecord>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for InMemoryBackend {
    fn get(&self, key: &str) -> Result<Option<StoredKeyRecord>, EngineError> {
        let records = self.records.read().unwrap();
        Ok(records.get(key).cloned())
    }

    fn set(&self, key: &str, record: &StoredKeyRecord) -> Result<(), EngineError> {
        let mut records = self.records.write().unwrap();
        records.insert(key.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), EngineError> {
        let mut records = self.records.write().unwrap();
        records.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a caller-supplied base directory. Writes go
/// through a temp-file-then-rename sequence so a crash mid-write never
/// leaves a partially-written record behind.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("create dir: {e}")))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_record(&self, path: &Path) -> Result<StoredKeyRecord, EngineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("read: {e}")))?;
        serde_json::from_str(&data)
            .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("parse: {e}")))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<StoredKeyRecord>, EngineError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).map(Some)
    }

    fn set(&self, key: &str, record: &StoredKeyRecord) -> Result<(), EngineError> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("serialize: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("write: {e}")))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("rename: {e}")))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), EngineError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| EngineError::with_detail(ErrorKind::KeyStorage, format!("delete: {e}")))?;
        }
        Ok(())
    }
}
