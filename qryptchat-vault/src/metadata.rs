//! Metadata Encryptor: serialize structured metadata to a string and
//! route it through the multi-recipient fan-out. Holds no cryptographic
//! logic of its own.

use std::collections::HashMap;

use qryptchat_envelope::EngineError;
use serde::{de::DeserializeOwned, Serialize};

use crate::directory::RecipientId;
use crate::fanout::{FanOut, FanOutResult};
use crate::vault::KeyVault;

/// The common case: attachment metadata sent alongside a file upload.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub mime: String,
    pub size: u64,
}

impl FanOut {
    /// Serializes `metadata` to JSON and fans it out like any other
    /// plaintext.
    pub async fn encrypt_metadata<T: Serialize>(&self, conversation_id: &str, metadata: &T) -> Result<FanOutResult, EngineError> {
        let json = serde_json::to_string(metadata)
            .map_err(|e| EngineError::with_detail(qryptchat_envelope::ErrorKind::Encryption, e.to_string()))?;
        self.encrypt_for_conversation(conversation_id, &json).await
    }

    /// Decrypts and JSON-parses a metadata envelope.
    pub async fn decrypt_metadata<T: DeserializeOwned>(&self, vault: &KeyVault, envelope_str: &str, sender_pk_b64: &str) -> Result<T, EngineError> {
        let plaintext = self.decrypt_for_current_user(vault, envelope_str, sender_pk_b64).await;
        serde_json::from_str(&plaintext)
            .map_err(|e| EngineError::with_detail(qryptchat_envelope::ErrorKind::FormatError, e.to_string()))
    }
}

/// Recipient list variant, for callers that already hold the membership.
pub async fn encrypt_metadata_for_recipients<T: Serialize>(
    fanout: &FanOut,
    recipient_ids: &[RecipientId],
    metadata: &T,
) -> Result<FanOutResult, EngineError> {
    let json = serde_json::to_string(metadata)
        .map_err(|e| EngineError::with_detail(qryptchat_envelope::ErrorKind::Encryption, e.to_string()))?;
    fanout.encrypt_for_recipients(recipient_ids, &json).await
}
