//! Durable per-user key lifecycle and multi-recipient fan-out on top of
//! `qryptchat_envelope`.
//!
//! [`vault::KeyVault`] owns the two resident ML-KEM key pairs and their
//! durable storage; [`fanout::FanOut`] resolves conversation participants
//! through an injected [`directory::ParticipantDirectory`] and calls the
//! single-recipient cipher once per recipient; [`metadata`] is a thin
//! serialization shim in front of the fan-out for structured payloads
//! like file attachments.
//!
//! ```ignore
//! use qryptchat_vault::{storage::InMemoryBackend, vault::KeyVault};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let vault = KeyVault::new(Arc::new(InMemoryBackend::new()));
//! vault.init().await.unwrap();
//! # });
//! ```

pub mod directory;
pub mod fanout;
pub mod metadata;
pub mod storage;
pub mod types;
pub mod vault;

pub use directory::{ParticipantDirectory, RecipientId};
pub use fanout::{FanOut, FanOutResult, RecipientFailure};
pub use metadata::FileMetadata;
pub use storage::{FileBackend, InMemoryBackend, StorageBackend};
pub use types::{KeyPair, UserKeyState};
pub use vault::KeyVault;
