//! Error types for the cryptographic capability layer.

use thiserror::Error;

/// Errors from cryptographic operations.
///
/// Decryption and verification failures deliberately carry no detail.
/// Everything an attacker could use to distinguish failure causes stays
/// inside this crate.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The algorithm URI is not in the registry, or is registered for a
    /// different purpose than the caller needs.
    #[error("unsupported algorithm: {uri}")]
    UnsupportedAlgorithm {
        /// The offending algorithm URI.
        uri: String,
    },

    /// Key material is unusable for the requested operation (wrong length,
    /// malformed encoding, secret key where a public key is required).
    #[error("invalid key material: {reason}")]
    InvalidKey {
        /// What was wrong with the key.
        reason: String,
    },

    /// Signature construction failed.
    #[error("signature construction failed: {reason}")]
    SignatureFailed {
        /// Underlying cause.
        reason: String,
    },

    /// Signature verification failed. No further detail by design.
    #[error("signature verification failed")]
    VerificationFailed,

    /// Decryption failed - wrong key, tampered ciphertext or malformed
    /// input. No further detail by design.
    #[error("decryption failed")]
    DecryptFailed,

    /// Encryption failed.
    #[error("encryption failed: {reason}")]
    EncryptFailed {
        /// Underlying cause.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_failures_render_without_detail() {
        assert_eq!(CryptoError::DecryptFailed.to_string(), "decryption failed");
        assert_eq!(CryptoError::VerificationFailed.to_string(), "signature verification failed");
    }
}
