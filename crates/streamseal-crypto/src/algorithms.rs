//! Algorithm-URI registry.
//!
//! Immutable, process-wide data built once at startup and passed around by
//! handle. The registry answers two questions: is this URI supported at
//! all, and what key length / purpose does it imply. It never maps a URI
//! to a primitive itself - the primitive modules match on the URI after
//! the registry has vouched for it.

use std::{collections::HashMap, sync::Arc};

use crate::error::CryptoError;

/// Standard algorithm identifiers.
pub mod uris {
    /// SHA-256 digest.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    /// RSA PKCS#1 v1.5 signature over SHA-256.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// HMAC over SHA-256.
    pub const HMAC_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#hmac-sha256";
    /// Ed25519 (EdDSA) signature.
    pub const ED25519: &str = "http://www.w3.org/2021/04/xmldsig-more#eddsa-ed25519";
    /// AES-128 in Galois/Counter mode.
    pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
    /// AES-256 in Galois/Counter mode.
    pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";
    /// RSA-OAEP key transport.
    pub const RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";
    /// Exclusive canonicalization without comments.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
}

/// What an algorithm is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    /// Message digest.
    Digest,
    /// Signature or MAC.
    Signature,
    /// Symmetric content encryption.
    ContentEncryption,
    /// Asymmetric key wrapping.
    KeyTransport,
    /// Canonical serialization.
    Canonicalization,
}

/// Registry entry for one algorithm URI.
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmSpec {
    /// The algorithm URI.
    pub uri: &'static str,
    /// Purpose of the algorithm.
    pub kind: AlgorithmKind,
    /// Required key length in bytes, for keyed algorithms with a fixed
    /// size.
    pub key_len: Option<usize>,
}

/// Immutable URI → [`AlgorithmSpec`] map.
#[derive(Debug)]
pub struct AlgorithmRegistry {
    specs: HashMap<&'static str, AlgorithmSpec>,
}

impl AlgorithmRegistry {
    /// The standard algorithm suite supported by this engine.
    pub fn standard() -> Arc<Self> {
        let entries = [
            AlgorithmSpec { uri: uris::SHA256, kind: AlgorithmKind::Digest, key_len: None },
            AlgorithmSpec { uri: uris::RSA_SHA256, kind: AlgorithmKind::Signature, key_len: None },
            AlgorithmSpec {
                uri: uris::HMAC_SHA256,
                kind: AlgorithmKind::Signature,
                key_len: None,
            },
            AlgorithmSpec { uri: uris::ED25519, kind: AlgorithmKind::Signature, key_len: None },
            AlgorithmSpec {
                uri: uris::AES128_GCM,
                kind: AlgorithmKind::ContentEncryption,
                key_len: Some(16),
            },
            AlgorithmSpec {
                uri: uris::AES256_GCM,
                kind: AlgorithmKind::ContentEncryption,
                key_len: Some(32),
            },
            AlgorithmSpec {
                uri: uris::RSA_OAEP_MGF1P,
                kind: AlgorithmKind::KeyTransport,
                key_len: None,
            },
            AlgorithmSpec {
                uri: uris::EXCLUSIVE_C14N,
                kind: AlgorithmKind::Canonicalization,
                key_len: None,
            },
        ];
        Arc::new(Self { specs: entries.into_iter().map(|spec| (spec.uri, spec)).collect() })
    }

    /// Look up an algorithm URI.
    pub fn get(&self, uri: &str) -> Result<&AlgorithmSpec, CryptoError> {
        self.specs
            .get(uri)
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm { uri: uri.to_string() })
    }

    /// Look up an algorithm URI and require a specific purpose.
    pub fn require(&self, uri: &str, kind: AlgorithmKind) -> Result<&AlgorithmSpec, CryptoError> {
        let spec = self.get(uri)?;
        if spec.kind == kind {
            Ok(spec)
        } else {
            Err(CryptoError::UnsupportedAlgorithm { uri: uri.to_string() })
        }
    }

    /// Required key length in bytes for a keyed algorithm.
    ///
    /// Unknown URIs and algorithms without a fixed key length both fail
    /// with `UnsupportedAlgorithm`.
    pub fn key_len(&self, uri: &str) -> Result<usize, CryptoError> {
        self.get(uri)?
            .key_len
            .ok_or_else(|| CryptoError::UnsupportedAlgorithm { uri: uri.to_string() })
    }
}
