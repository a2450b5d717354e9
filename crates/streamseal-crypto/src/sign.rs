//! Signature and verification keys.
//!
//! One enum per side rather than a trait object: the engine stores keys in
//! configuration and tokens, and a closed set keeps key material, wire
//! encoding and algorithm URI in one place.

use ed25519_dalek::{Signer as _, Verifier as _};
use hmac::{Hmac, Mac};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey, pkcs8::DecodePublicKey, pkcs8::EncodePublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::{algorithms::uris, error::CryptoError};

type HmacSha256 = Hmac<Sha256>;

/// How a verifying key is represented on the wire (in a binary token).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEncoding {
    /// SubjectPublicKeyInfo DER (RSA keys).
    RsaSpkiDer,
    /// Raw 32-byte Ed25519 public key.
    Ed25519Raw,
}

/// A private signing key.
pub enum SigningKey {
    /// RSA PKCS#1 v1.5 with SHA-256.
    RsaSha256(RsaPrivateKey),
    /// HMAC-SHA256 shared secret.
    HmacSha256(Zeroizing<Vec<u8>>),
    /// Ed25519.
    Ed25519(ed25519_dalek::SigningKey),
}

/// A public verification key (or, for HMAC, the shared secret).
#[derive(Clone)]
pub enum VerifyingKey {
    /// RSA PKCS#1 v1.5 with SHA-256.
    RsaSha256(RsaPublicKey),
    /// HMAC-SHA256 shared secret.
    HmacSha256(Zeroizing<Vec<u8>>),
    /// Ed25519.
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl SigningKey {
    /// HMAC signing key from a shared secret.
    pub fn hmac(secret: Vec<u8>) -> Self {
        Self::HmacSha256(Zeroizing::new(secret))
    }

    /// The signature algorithm URI this key implements.
    pub fn algorithm_uri(&self) -> &'static str {
        match self {
            Self::RsaSha256(_) => uris::RSA_SHA256,
            Self::HmacSha256(_) => uris::HMAC_SHA256,
            Self::Ed25519(_) => uris::ED25519,
        }
    }

    /// Sign `data`, returning the raw signature bytes.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            Self::RsaSha256(key) => {
                let digest = Sha256::digest(data);
                key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest).map_err(|err| {
                    CryptoError::SignatureFailed { reason: err.to_string() }
                })
            },
            Self::HmacSha256(secret) => {
                let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| {
                    CryptoError::InvalidKey { reason: "empty HMAC secret".to_string() }
                })?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            },
            Self::Ed25519(key) => Ok(key.sign(data).to_bytes().to_vec()),
        }
    }

    /// The verification-side key for this signing key.
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::RsaSha256(key) => VerifyingKey::RsaSha256(key.to_public_key()),
            Self::HmacSha256(secret) => VerifyingKey::HmacSha256(secret.clone()),
            Self::Ed25519(key) => VerifyingKey::Ed25519(key.verifying_key()),
        }
    }
}

impl VerifyingKey {
    /// The signature algorithm URI this key verifies.
    pub fn algorithm_uri(&self) -> &'static str {
        match self {
            Self::RsaSha256(_) => uris::RSA_SHA256,
            Self::HmacSha256(_) => uris::HMAC_SHA256,
            Self::Ed25519(_) => uris::ED25519,
        }
    }

    /// Verify `signature` over `data`.
    ///
    /// # Errors
    ///
    /// `VerificationFailed` for any mismatch; no further detail.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        match self {
            Self::RsaSha256(key) => {
                let digest = Sha256::digest(data);
                key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
                    .map_err(|_| CryptoError::VerificationFailed)
            },
            Self::HmacSha256(secret) => {
                let mut mac = HmacSha256::new_from_slice(secret)
                    .map_err(|_| CryptoError::VerificationFailed)?;
                mac.update(data);
                mac.verify_slice(signature).map_err(|_| CryptoError::VerificationFailed)
            },
            Self::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::VerificationFailed)?;
                key.verify(data, &signature).map_err(|_| CryptoError::VerificationFailed)
            },
        }
    }

    /// Export the key for a binary token.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for HMAC: a shared secret never goes on the wire.
    pub fn export(&self) -> Result<(KeyEncoding, Vec<u8>), CryptoError> {
        match self {
            Self::RsaSha256(key) => {
                let der = key.to_public_key_der().map_err(|err| CryptoError::InvalidKey {
                    reason: err.to_string(),
                })?;
                Ok((KeyEncoding::RsaSpkiDer, der.as_bytes().to_vec()))
            },
            Self::HmacSha256(_) => Err(CryptoError::InvalidKey {
                reason: "shared secrets have no wire representation".to_string(),
            }),
            Self::Ed25519(key) => Ok((KeyEncoding::Ed25519Raw, key.to_bytes().to_vec())),
        }
    }

    /// Import a key from its binary-token form.
    pub fn import(encoding: KeyEncoding, bytes: &[u8]) -> Result<Self, CryptoError> {
        match encoding {
            KeyEncoding::RsaSpkiDer => {
                let key = RsaPublicKey::from_public_key_der(bytes).map_err(|err| {
                    CryptoError::InvalidKey { reason: err.to_string() }
                })?;
                Ok(Self::RsaSha256(key))
            },
            KeyEncoding::Ed25519Raw => {
                let raw: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKey {
                    reason: format!("Ed25519 key must be 32 bytes, got {}", bytes.len()),
                })?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&raw).map_err(|err| {
                    CryptoError::InvalidKey { reason: err.to_string() }
                })?;
                Ok(Self::Ed25519(key))
            },
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RsaSha256(_) => "SigningKey::RsaSha256",
            Self::HmacSha256(_) => "SigningKey::HmacSha256",
            Self::Ed25519(_) => "SigningKey::Ed25519",
        })
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RsaSha256(_) => "VerifyingKey::RsaSha256",
            Self::HmacSha256(_) => "VerifyingKey::HmacSha256",
            Self::Ed25519(_) => "VerifyingKey::Ed25519",
        })
    }
}
