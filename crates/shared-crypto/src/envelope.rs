//! # Notification Envelope
//!
//! Asymmetric sealing of a notification plaintext for one recipient key.
//!
//! ## Construction
//!
//! 1. X25519 agreement between the sender secret and the recipient public key
//! 2. BLAKE3 `derive_key` over `shared || sender_pub || recipient_pub`
//! 3. XChaCha20-Poly1305 with the sender public key as associated data
//!
//! The sender public key travels in the envelope so the receiver can run key
//! discovery against what was actually presented.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::hashing::blake3_derive_key;
use crate::keys::{NodeKeyPair, PublicKeyBytes};
use crate::symmetric::{self, Nonce, SecretKey};
use crate::CryptoError;

const KDF_CONTEXT: &str = "fleet-notify 2024 envelope x25519 xchacha20poly1305";

/// Encrypted wire form of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Public key of the sealing sender.
    pub public_key: PublicKeyBytes,
    /// Hex-encoded AEAD nonce.
    pub nonce: String,
    /// Hex-encoded ciphertext.
    pub ciphertext: String,
}

fn envelope_key(
    ours: &NodeKeyPair,
    theirs: &PublicKeyBytes,
    sender: &PublicKeyBytes,
    recipient: &PublicKeyBytes,
) -> Result<SecretKey, CryptoError> {
    let shared = ours.agree(theirs)?;
    let mut material = Zeroizing::new(Vec::with_capacity(96));
    material.extend_from_slice(shared.as_bytes());
    material.extend_from_slice(sender.as_bytes());
    material.extend_from_slice(recipient.as_bytes());
    Ok(SecretKey::from_bytes(blake3_derive_key(KDF_CONTEXT, &material)))
}

/// Seal `plaintext` from `sender` to `recipient`.
///
/// # Errors
///
/// `CryptoError::InvalidPublicKey` for a low-order recipient key, or
/// `CryptoError::EncryptionFailed`.
pub fn seal(
    plaintext: &[u8],
    sender: &NodeKeyPair,
    recipient: &PublicKeyBytes,
) -> Result<Envelope, CryptoError> {
    let sender_pub = sender.public();
    let key = envelope_key(sender, recipient, &sender_pub, recipient)?;
    let (ciphertext, nonce) = symmetric::encrypt(&key, plaintext, sender_pub.as_bytes())?;
    Ok(Envelope {
        public_key: sender_pub,
        nonce: hex::encode(nonce.as_bytes()),
        ciphertext: hex::encode(ciphertext),
    })
}

/// Open an envelope with exactly the `(recipient, sender_pub)` pair.
///
/// Fails closed: if the envelope claims a different sender key than
/// `sender_pub`, nothing is decrypted.
///
/// # Errors
///
/// - `CryptoError::SenderKeyMismatch` - envelope key differs from `sender_pub`
/// - `CryptoError::InvalidEncoding` / `InvalidNonceLength` - malformed fields
/// - `CryptoError::DecryptionFailed` - wrong recipient key or tampering
pub fn open(
    envelope: &Envelope,
    recipient: &NodeKeyPair,
    sender_pub: &PublicKeyBytes,
) -> Result<Vec<u8>, CryptoError> {
    if envelope.public_key != *sender_pub {
        return Err(CryptoError::SenderKeyMismatch);
    }
    let nonce_bytes =
        hex::decode(&envelope.nonce).map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes)?;
    let ciphertext = hex::decode(&envelope.ciphertext)
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

    let recipient_pub = recipient.public();
    let key = envelope_key(recipient, sender_pub, sender_pub, &recipient_pub)?;
    symmetric::decrypt(&key, &ciphertext, &nonce, sender_pub.as_bytes())
}
