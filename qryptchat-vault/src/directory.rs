//! Participant Directory: the external collaborator a caller injects so
//! the fan-out logic can resolve conversation membership and public keys
//! without this crate owning a network client.

use std::collections::HashMap;

use qryptchat_envelope::EngineError;

/// A recipient identifier, opaque to this crate.
pub type RecipientId = String;

#[async_trait::async_trait]
pub trait ParticipantDirectory: Send + Sync {
    /// All participants in a conversation, keyed by recipient id, with
    /// their base64 public key candidate. An empty map or directory
    /// failure both surface as [`qryptchat_envelope::ErrorKind::NoParticipants`]
    /// one level up, in the fan-out call itself.
    async fn get_participants(&self, conversation_id: &str) -> Result<HashMap<RecipientId, String>, EngineError>;

    /// A single user's current public key, for `encrypt_for_recipients`.
    async fn get_user_public_key(&self, recipient_id: &str) -> Result<String, EngineError>;
}
