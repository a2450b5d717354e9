//! Security tokens and token providers.
//!
//! A token is an identified unit of key material scoped to one message.
//! Tokens are created as their defining elements finish streaming and are
//! looked up later through the per-message registry in
//! [`crate::context::SecurityContext`]. The supported subset is
//! forward-reference-only: a token-defining element always streams before
//! anything referencing its id.

use std::rc::Rc;

use streamseal_crypto::{RsaPrivateKey, VerifyingKey};

use crate::error::SecurityError;

/// Raw symmetric token bytes, zeroized on drop.
pub struct SecretBytes(zeroize::Zeroizing<Vec<u8>>);

impl SecretBytes {
    /// Wrap raw key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(zeroize::Zeroizing::new(bytes))
    }

    /// The raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes({} bytes)", self.0.len())
    }
}

/// How a token was (or should be) identified on the wire.
///
/// A token's own classification can be overridden for one usage site via
/// [`DelegatedToken`] without copying the key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIdentifier {
    /// Direct reference to a binary security token in the same message.
    BstDirectReference,
    /// X.509 certificate identifier.
    X509KeyIdentifier,
    /// Subject key identifier extension.
    SkiKeyIdentifier,
    /// Certificate thumbprint.
    ThumbprintIdentifier,
    /// Issuer name and serial number.
    IssuerSerial,
    /// Secret carried by an encrypted-key element.
    EmbeddedSecret,
}

/// An identified unit of key material.
///
/// Holds zero-or-one symmetric secret and zero-or-one asymmetric side
/// (verification key and/or decryption key). Which side a consumer needs
/// depends on the operation; absent material surfaces as a
/// [`SecurityError::FailedCheck`] at the point of use.
#[derive(Debug, Default)]
pub struct SecurityToken {
    id: Option<String>,
    secret: Option<SecretBytes>,
    verifying_key: Option<VerifyingKey>,
    decryption_key: Option<RsaPrivateKey>,
}

impl SecurityToken {
    /// A token carrying a symmetric secret.
    pub fn symmetric(id: impl Into<String>, secret: Vec<u8>) -> Self {
        Self {
            id: Some(id.into()),
            secret: Some(SecretBytes::new(secret)),
            ..Self::default()
        }
    }

    /// A token carrying a verification key.
    pub fn verification(id: impl Into<String>, key: VerifyingKey) -> Self {
        Self { id: Some(id.into()), verifying_key: Some(key), ..Self::default() }
    }

    /// An anonymous token carrying a decryption key.
    pub fn decryption(key: RsaPrivateKey) -> Self {
        Self { decryption_key: Some(key), ..Self::default() }
    }

    /// The token id, if the defining element carried one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Symmetric secret bytes, if present.
    pub fn secret(&self) -> Option<&SecretBytes> {
        self.secret.as_ref()
    }

    /// Verification key, if present.
    pub fn verifying_key(&self) -> Option<&VerifyingKey> {
        self.verifying_key.as_ref()
    }

    /// Decryption key, if present.
    pub fn decryption_key(&self) -> Option<&RsaPrivateKey> {
        self.decryption_key.as_ref()
    }
}

/// A non-owning reinterpretation of another token.
///
/// The same key material viewed under a different wire classification:
/// the underlying token is shared, not copied, and only the key-identifier
/// classification is overridden.
#[derive(Debug, Clone)]
pub struct DelegatedToken {
    underlying: Rc<SecurityToken>,
    key_identifier: KeyIdentifier,
}

impl DelegatedToken {
    /// Reinterpret `underlying` under `key_identifier`.
    pub fn new(underlying: Rc<SecurityToken>, key_identifier: KeyIdentifier) -> Self {
        Self { underlying, key_identifier }
    }

    /// The shared underlying token.
    pub fn underlying(&self) -> &SecurityToken {
        &self.underlying
    }

    /// The overridden classification.
    pub fn key_identifier(&self) -> KeyIdentifier {
        self.key_identifier
    }
}

/// Resolves a token on demand.
///
/// Registered in the per-message registry under the defining element's id.
/// Indirection matters: a provider registered while its key material is
/// still being settled (the anti-oracle substitute key) resolves to
/// whatever the material turned out to be.
pub trait TokenProvider {
    /// The resolved token.
    fn token(&self) -> Result<Rc<SecurityToken>, SecurityError>;
}

/// Provider for a token that is already fully resolved.
pub struct StaticTokenProvider {
    token: Rc<SecurityToken>,
}

impl StaticTokenProvider {
    /// Wrap a resolved token.
    pub fn new(token: SecurityToken) -> Self {
        Self { token: Rc::new(token) }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token(&self) -> Result<Rc<SecurityToken>, SecurityError> {
        Ok(Rc::clone(&self.token))
    }
}
