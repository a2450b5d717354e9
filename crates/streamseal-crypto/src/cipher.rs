//! Content encryption using AES-GCM.
//!
//! The wire form of a cipher value is `nonce || ciphertext+tag`: the
//! 12-byte nonce is prepended so the value is self-contained once base64
//! encoded into the document.

use aes_gcm::{
    Aes128Gcm, Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};

use crate::{algorithms::uris, error::CryptoError, secret::SymmetricSecret};

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `secret`, returning `nonce || ciphertext+tag`.
///
/// The caller provides the nonce; it MUST be unique per (key, message).
/// The engine draws nonces from its environment entropy source, which
/// keeps this function deterministic for testing.
///
/// # Errors
///
/// - `InvalidKey` if the key length does not match the secret's algorithm
/// - `UnsupportedAlgorithm` if the secret names a non-AEAD algorithm
pub fn seal(
    secret: &SymmetricSecret,
    nonce: [u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let ciphertext = match secret.algorithm_uri() {
        uris::AES128_GCM => {
            let cipher = Aes128Gcm::new_from_slice(secret.as_bytes()).map_err(|_| {
                CryptoError::InvalidKey { reason: key_len_mismatch(secret, 16) }
            })?;
            cipher.encrypt(Nonce::from_slice(&nonce), plaintext)
        },
        uris::AES256_GCM => {
            let cipher = Aes256Gcm::new_from_slice(secret.as_bytes()).map_err(|_| {
                CryptoError::InvalidKey { reason: key_len_mismatch(secret, 32) }
            })?;
            cipher.encrypt(Nonce::from_slice(&nonce), plaintext)
        },
        other => {
            return Err(CryptoError::UnsupportedAlgorithm { uri: other.to_string() });
        },
    }
    .map_err(|_| CryptoError::EncryptFailed { reason: "AEAD seal failed".to_string() })?;

    let mut wire = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    wire.extend_from_slice(&nonce);
    wire.extend_from_slice(&ciphertext);
    Ok(wire)
}

/// Decrypt a `nonce || ciphertext+tag` value produced by [`seal`].
///
/// # Errors
///
/// - `DecryptFailed` for truncated input, a wrong key, a wrong key length
///   or a failed authentication tag - deliberately indistinguishable
/// - `UnsupportedAlgorithm` if the secret names a non-AEAD algorithm
pub fn open(secret: &SymmetricSecret, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptFailed);
    }
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);

    match secret.algorithm_uri() {
        uris::AES128_GCM => {
            let cipher = Aes128Gcm::new_from_slice(secret.as_bytes())
                .map_err(|_| CryptoError::DecryptFailed)?;
            cipher.decrypt(Nonce::from_slice(nonce), ciphertext)
        },
        uris::AES256_GCM => {
            let cipher = Aes256Gcm::new_from_slice(secret.as_bytes())
                .map_err(|_| CryptoError::DecryptFailed)?;
            cipher.decrypt(Nonce::from_slice(nonce), ciphertext)
        },
        other => {
            return Err(CryptoError::UnsupportedAlgorithm { uri: other.to_string() });
        },
    }
    .map_err(|_| CryptoError::DecryptFailed)
}

fn key_len_mismatch(secret: &SymmetricSecret, expected: usize) -> String {
    format!("key is {} bytes, algorithm needs {expected}", secret.len())
}
