//! Post-quantum per-recipient envelope encryption.
//!
//! Turns a UTF-8 plaintext and a recipient's public key into a versioned
//! JSON envelope (`v=3`) carrying one ML-KEM ciphertext and one
//! ChaCha20-Poly1305 ciphertext. See [`cipher::encrypt_for`] and
//! [`cipher::decrypt`] for the entry points; [`kem`] and [`hygiene`] cover
//! key material and externally supplied public keys respectively.

#![deny(unsafe_code)]

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod hygiene;
pub mod kem;
pub mod primitives;

pub use cipher::{decrypt, encrypt_for};
pub use error::{EngineError, ErrorKind};
pub use kem::{KemAlgorithm, PublicKey, SecretKey};
