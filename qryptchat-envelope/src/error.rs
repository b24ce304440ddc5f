//! Shared error taxonomy.
//!
//! A single `EngineError` carries a matchable `ErrorKind` plus an optional,
//! non-secret detail string. `Decryption` never carries detail: every
//! decryption failure, whatever its root cause, collapses to the same kind
//! before it reaches a caller (oracle discipline).

use std::fmt;

/// The error kinds shared by every component in this crate and the vault
/// crate built on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyGeneration,
    KeyStorage,
    InvalidKey,
    IncompatibleKey,
    InvalidPublicKey,
    NotCiphertext,
    FormatError,
    UnknownAlg,
    LegacyUnsupported,
    Encryption,
    Decryption,
    NoParticipants,
    AllRecipientsFailed,
    AllRecipientsIncompatible,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::KeyGeneration => "key_generation",
            ErrorKind::KeyStorage => "key_storage",
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::IncompatibleKey => "incompatible_key",
            ErrorKind::InvalidPublicKey => "invalid_public_key",
            ErrorKind::NotCiphertext => "not_ciphertext",
            ErrorKind::FormatError => "format_error",
            ErrorKind::UnknownAlg => "unknown_alg",
            ErrorKind::LegacyUnsupported => "legacy_unsupported",
            ErrorKind::Encryption => "encryption",
            ErrorKind::Decryption => "decryption",
            ErrorKind::NoParticipants => "no_participants",
            ErrorKind::AllRecipientsFailed => "all_recipients_failed",
            ErrorKind::AllRecipientsIncompatible => "all_recipients_incompatible",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An engine-level error: a matchable kind plus optional diagnostic detail.
///
/// Detail must never contain key material, shared secrets, or plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    kind: ErrorKind,
    detail: Option<String>,
}

impl EngineError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }

    /// The single canonical decryption failure. Carries no detail by
    /// construction so a caller (or a log line) can never distinguish why
    /// a decapsulation or AEAD open failed.
    pub fn decryption() -> Self {
        Self::new(ErrorKind::Decryption)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(d) => write!(f, "{}: {}", self.kind, d),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EngineError {}
