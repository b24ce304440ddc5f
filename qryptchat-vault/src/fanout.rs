//! Multi-Recipient Fan-Out: resolve participants through the directory,
//! encrypt to each one independently, and aggregate outcomes so a
//! partially-incompatible recipient set never blocks the whole send.

use std::collections::HashMap;
use std::sync::Arc;

use qryptchat_envelope::{cipher, EngineError, ErrorKind, KemAlgorithm};

use crate::directory::{ParticipantDirectory, RecipientId};
use crate::vault::KeyVault;

/// A recipient that failed, with the kind of failure observed.
#[derive(Debug, Clone)]
pub struct RecipientFailure {
    pub recipient_id: RecipientId,
    pub kind: ErrorKind,
}

/// Successful encryptions plus a ledger of anyone who failed. Callers
/// decide whether a non-empty ledger still warrants sending.
#[derive(Debug, Clone, Default)]
pub struct FanOutResult {
    pub envelopes: HashMap<RecipientId, String>,
    pub failures: Vec<RecipientFailure>,
}

pub struct FanOut {
    directory: Arc<dyn ParticipantDirectory>,
}

impl FanOut {
    pub fn new(directory: Arc<dyn ParticipantDirectory>) -> Self {
        Self { directory }
    }

    /// Encrypts `plaintext` to every current participant of `conversation_id`.
    pub async fn encrypt_for_conversation(&self, conversation_id: &str, plaintext: &str) -> Result<FanOutResult, EngineError> {
        let participants = self
            .directory
            .get_participants(conversation_id)
            .await
            .map_err(|_| EngineError::new(ErrorKind::NoParticipants))?;

        if participants.is_empty() {
            return Err(EngineError::new(ErrorKind::NoParticipants));
        }

        self.encrypt_to_map(participants, Vec::new(), plaintext).await
    }

    /// Encrypts `plaintext` to an explicit recipient set, querying the
    /// directory for each one's current public key.
    pub async fn encrypt_for_recipients(&self, recipient_ids: &[RecipientId], plaintext: &str) -> Result<FanOutResult, EngineError> {
        if recipient_ids.is_empty() {
            return Err(EngineError::new(ErrorKind::NoParticipants));
        }

        let mut participants = HashMap::with_capacity(recipient_ids.len());
        let mut lookup_failures = Vec::new();
        for id in recipient_ids {
            match self.directory.get_user_public_key(id).await {
                Ok(pk) => {
                    participants.insert(id.clone(), pk);
                }
                Err(e) => lookup_failures.push(RecipientFailure {
                    recipient_id: id.clone(),
                    kind: e.kind(),
                }),
            }
        }

        self.encrypt_to_map(participants, lookup_failures, plaintext).await
    }

    /// Thin wrapper over single-recipient decrypt; `sender_pk_b64` is
    /// informational only, per the scheme's lack of sender authentication.
    ///
    /// Both resident private keys are resolved up front since C6's
    /// resolver callback is synchronous and the vault's accessors are not.
    pub async fn decrypt_for_current_user(&self, vault: &KeyVault, envelope_str: &str, _sender_pk_b64: &str) -> String {
        let primary = vault.private_key(KemAlgorithm::Primary).await.ok();
        let legacy = vault.private_key(KemAlgorithm::Legacy).await.ok();

        cipher::decrypt(envelope_str, move |alg| match alg {
            KemAlgorithm::Primary => primary.clone(),
            KemAlgorithm::Legacy => legacy.clone(),
        })
    }

    /// `seed_failures` lets callers merge in failures observed before any
    /// encryption was attempted (e.g. directory lookups that never
    /// produced a public key) so the incompatible/failed classification
    /// below sees the complete ledger, not just the cipher-side half.
    async fn encrypt_to_map(
        &self,
        participants: HashMap<RecipientId, String>,
        seed_failures: Vec<RecipientFailure>,
        plaintext: &str,
    ) -> Result<FanOutResult, EngineError> {
        let tasks: Vec<_> = participants
            .into_iter()
            .map(|(recipient_id, pk_b64)| {
                let plaintext = plaintext.to_string();
                tokio::spawn(async move {
                    let outcome = cipher::encrypt_for(&pk_b64, &plaintext);
                    (recipient_id, outcome)
                })
            })
            .collect();

        let mut result = FanOutResult {
            failures: seed_failures,
            ..Default::default()
        };
        for task in tasks {
            let (recipient_id, outcome) = task.await.map_err(|e| {
                EngineError::with_detail(ErrorKind::Encryption, e.to_string())
            })?;
            match outcome {
                Ok(envelope) => {
                    result.envelopes.insert(recipient_id, envelope);
                }
                Err(e) => result.failures.push(RecipientFailure {
                    recipient_id,
                    kind: e.kind(),
                }),
            }
        }

        if result.envelopes.is_empty() {
            let all_incompatible = !result.failures.is_empty()
                && result
                    .failures
                    .iter()
                    .all(|f| matches!(f.kind, ErrorKind::IncompatibleKey));
            if all_incompatible {
                tracing::warn!(count = result.failures.len(), "all recipients incompatible");
                return Err(EngineError::new(ErrorKind::AllRecipientsIncompatible));
            }
            tracing::warn!(count = result.failures.len(), "all recipients failed");
            return Err(EngineError::new(ErrorKind::AllRecipientsFailed));
        }

        if !result.failures.is_empty() {
            tracing::warn!(ok = result.envelopes.len(), failed = result.failures.len(), "partial fan-out success");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBackend;
    use async_trait::async_trait;
    use qryptchat_envelope::KemAlgorithm;

    struct FixedDirectory {
        participants: HashMap<String, String>,
    }

    #[async_trait]
    impl ParticipantDirectory for FixedDirectory {
        async fn get_participants(&self, _conversation_id: &str) -> Result<HashMap<String, String>, EngineError> {
            Ok(self.participants.clone())
        }
        async fn get_user_public_key(&self, recipient_id: &str) -> Result<String, EngineError> {
            self.participants
                .get(recipient_id)
                .cloned()
                .ok_or_else(|| EngineError::new(ErrorKind::InvalidPublicKey))
        }
    }

    async fn alice_and_bob_keys() -> (KeyVault, KeyVault, String, String) {
        let alice = KeyVault::new(Arc::new(InMemoryBackend::new()));
        let bob = KeyVault::new(Arc::new(InMemoryBackend::new()));
        alice.init().await.unwrap();
        bob.init().await.unwrap();
        let alice_pk = alice.public_key(KemAlgorithm::Primary).await.unwrap();
        let bob_pk = bob.public_key(KemAlgorithm::Primary).await.unwrap();
        (alice, bob, alice_pk, bob_pk)
    }

    #[tokio::test]
    async fn empty_conversation_is_no_participants() {
        let directory = FixedDirectory { participants: HashMap::new() };
        let fanout = FanOut::new(Arc::new(directory));
        let err = fanout.encrypt_for_conversation("convo", "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoParticipants);
    }

    #[tokio::test]
    async fn all_recipients_succeed_and_each_decrypts() {
        let (alice, bob, alice_pk, bob_pk) = alice_and_bob_keys().await;
        let mut participants = HashMap::new();
        participants.insert("alice".to_string(), alice_pk);
        participants.insert("bob".to_string(), bob_pk);
        let fanout = FanOut::new(Arc::new(FixedDirectory { participants }));

        let result = fanout.encrypt_for_conversation("convo", "group secret").await.unwrap();
        assert!(result.failures.is_empty());
        assert_eq!(result.envelopes.len(), 2);

        let alice_out = fanout
            .decrypt_for_current_user(&alice, result.envelopes.get("alice").unwrap(), "unused")
            .await;
        assert_eq!(alice_out, "group secret");

        let bob_out = fanout
            .decrypt_for_current_user(&bob, result.envelopes.get("bob").unwrap(), "unused")
            .await;
        assert_eq!(bob_out, "group secret");
    }

    fn kyber_header_candidate() -> String {
        let mut bytes = b"KYBER".to_vec();
        bytes.extend(vec![0x33u8; KemAlgorithm::Primary.pk_size() - 5]);
        base64::encode(&bytes)
    }

    #[tokio::test]
    async fn one_incompatible_recipient_does_not_abort_the_send() {
        let (alice, _bob, alice_pk, _) = alice_and_bob_keys().await;
        let mut participants = HashMap::new();
        participants.insert("alice".to_string(), alice_pk);
        participants.insert("corrupt".to_string(), kyber_header_candidate());
        let fanout = FanOut::new(Arc::new(FixedDirectory { participants }));

        let result = fanout.encrypt_for_conversation("convo", "partial").await.unwrap();
        assert_eq!(result.envelopes.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].kind, ErrorKind::IncompatibleKey);

        let out = fanout
            .decrypt_for_current_user(&alice, result.envelopes.get("alice").unwrap(), "unused")
            .await;
        assert_eq!(out, "partial");
    }

    #[tokio::test]
    async fn all_incompatible_recipients_is_a_distinguished_error() {
        let mut participants = HashMap::new();
        participants.insert("bad1".to_string(), kyber_header_candidate());
        participants.insert("bad2".to_string(), kyber_header_candidate());
        let fanout = FanOut::new(Arc::new(FixedDirectory { participants }));

        let err = fanout.encrypt_for_conversation("convo", "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllRecipientsIncompatible);
    }

    #[tokio::test]
    async fn recipient_lookup_failures_merge_into_the_ledger() {
        // Neither "ghost" id is in the directory, so both lookups fail
        // before any encryption is even attempted.
        let fanout = FanOut::new(Arc::new(FixedDirectory { participants: HashMap::new() }));

        let err = fanout
            .encrypt_for_recipients(&["ghost1".to_string(), "ghost2".to_string()], "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllRecipientsFailed);
    }

    #[tokio::test]
    async fn all_incompatible_lookup_failures_classify_as_incompatible() {
        struct IncompatibleDirectory;

        #[async_trait]
        impl ParticipantDirectory for IncompatibleDirectory {
            async fn get_participants(&self, _conversation_id: &str) -> Result<HashMap<String, String>, EngineError> {
                Ok(HashMap::new())
            }
            async fn get_user_public_key(&self, _recipient_id: &str) -> Result<String, EngineError> {
                Err(EngineError::new(ErrorKind::IncompatibleKey))
            }
        }

        let fanout = FanOut::new(Arc::new(IncompatibleDirectory));
        let err = fanout
            .encrypt_for_recipients(&["bad1".to_string(), "bad2".to_string()], "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllRecipientsIncompatible);
    }

    #[tokio::test]
    async fn one_lookup_failure_does_not_abort_the_send() {
        let (alice, _bob, alice_pk, _) = alice_and_bob_keys().await;
        let mut participants = HashMap::new();
        participants.insert("alice".to_string(), alice_pk);
        let fanout = FanOut::new(Arc::new(FixedDirectory { participants }));

        let result = fanout
            .encrypt_for_recipients(&["alice".to_string(), "ghost".to_string()], "partial")
            .await
            .unwrap();
        assert_eq!(result.envelopes.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].recipient_id, "ghost");

        let out = fanout
            .decrypt_for_current_user(&alice, result.envelopes.get("alice").unwrap(), "unused")
            .await;
        assert_eq!(out, "partial");
    }
}
