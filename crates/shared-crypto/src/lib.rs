//! # Shared Crypto - Envelope Cryptography
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `keys` | X25519 | Node key pairs, key agreement |
//! | `envelope` | X25519 + BLAKE3 KDF + XChaCha20-Poly1305 | Sealed notifications |
//! | `symmetric` | XChaCha20-Poly1305 | AEAD primitive |
//! | `hashing` | BLAKE3 | Key derivation, fingerprints |
//!
//! ## Security Properties
//!
//! - **XChaCha20**: 192-bit random nonce, constant-time ARX design
//! - **Envelope binding**: the sender public key is authenticated as AAD, so
//!   an envelope cannot be replayed under a different claimed sender key
//! - **Fail closed**: opening with any key pair other than the one the
//!   envelope was sealed for is an error, never garbage plaintext

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod errors;
pub mod hashing;
pub mod keys;
pub mod symmetric;

// Re-exports
pub use envelope::{open, seal, Envelope};
pub use errors::CryptoError;
pub use hashing::{blake3_derive_key, blake3_hash, blake3_hash_many};
pub use keys::{NodeKeyPair, PublicKeyBytes};
pub use symmetric::{decrypt, encrypt, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
