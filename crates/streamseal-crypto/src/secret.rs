//! Symmetric key material.

use zeroize::Zeroizing;

/// A symmetric key bound to the content-encryption algorithm it was
/// generated for.
///
/// The key bytes are zeroized when the secret is dropped. The algorithm
/// URI travels with the key so a consumer can never pair a key with the
/// wrong cipher silently - length mismatches surface as
/// [`crate::CryptoError::InvalidKey`] at use.
pub struct SymmetricSecret {
    bytes: Zeroizing<Vec<u8>>,
    algorithm_uri: String,
}

impl SymmetricSecret {
    /// Wrap raw key bytes for the given content-encryption algorithm.
    pub fn new(bytes: Vec<u8>, algorithm_uri: impl Into<String>) -> Self {
        Self { bytes: Zeroizing::new(bytes), algorithm_uri: algorithm_uri.into() }
    }

    /// The raw key bytes.
    ///
    /// Needed by key transport (the bytes themselves are the wrapped
    /// payload). Do not copy them anywhere that outlives the secret.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for an empty (zero-length) key.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The content-encryption algorithm this key belongs to.
    pub fn algorithm_uri(&self) -> &str {
        &self.algorithm_uri
    }
}

impl std::fmt::Debug for SymmetricSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key bytes.
        f.debug_struct("SymmetricSecret")
            .field("len", &self.bytes.len())
            .field("algorithm_uri", &self.algorithm_uri)
            .finish()
    }
}
