//! RSA-OAEP key transport.
//!
//! Wraps a short-lived symmetric key for a recipient's public key. The
//! unwrap side returns a uniform [`CryptoError::DecryptFailed`] for every
//! failure mode; distinguishing them is exactly what a padding oracle
//! needs, so the distinction dies here.

use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Wrap `key_bytes` for `recipient` using RSA-OAEP (SHA-256).
pub fn wrap_key(recipient: &RsaPublicKey, key_bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut rng = rand::rngs::OsRng;
    recipient
        .encrypt(&mut rng, Oaep::new::<Sha256>(), key_bytes)
        .map_err(|err| CryptoError::EncryptFailed { reason: err.to_string() })
}

/// Unwrap a key transported with [`wrap_key`].
///
/// # Errors
///
/// `DecryptFailed` for every failure mode, uniformly.
pub fn unwrap_key(
    private: &RsaPrivateKey,
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    private
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptFailed)
}
