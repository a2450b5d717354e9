//! Processing configuration.
//!
//! An ordered list of requested protection actions plus the key material
//! and algorithm selections they need. The engine executes this list
//! without deciding policy - which parts of a message deserve protection
//! is somebody else's call.

use std::sync::Arc;

use streamseal_crypto::{
    AlgorithmRegistry, RsaPrivateKey, RsaPublicKey, SigningKey, VerifyingKey, uris,
};
use streamseal_xml::QName;

use crate::env::{Environment, SystemEnvironment};

/// One requested protection action, applied in list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Emit a creation/expiry timestamp.
    Timestamp,
    /// Sign the configured signature parts.
    Signature,
    /// Encrypt the configured encryption parts.
    Encrypt,
}

/// How much of a matched element an action covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// The whole element including its tags.
    Element,
    /// Only the element's content; the tags stay in clear.
    Content,
}

/// An element or fragment eligible for protection.
#[derive(Debug, Clone)]
pub struct SecurePart {
    pub(crate) name: Option<QName>,
    pub(crate) id: Option<String>,
    pub(crate) coverage: Coverage,
}

impl SecurePart {
    /// Match by expanded element name, whole-element coverage.
    pub fn element(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            name: Some(QName::new(namespace_uri, local_name, "")),
            id: None,
            coverage: Coverage::Element,
        }
    }

    /// Match by expanded element name, content-only coverage.
    pub fn content(namespace_uri: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            name: Some(QName::new(namespace_uri, local_name, "")),
            id: None,
            coverage: Coverage::Content,
        }
    }

    /// Match by an existing id attribute, whole-element coverage.
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { name: None, id: Some(id.into()), coverage: Coverage::Element }
    }
}

/// Algorithm selections by URI, resolved through the registry at use.
#[derive(Debug, Clone)]
pub struct AlgorithmSuite {
    /// Digest algorithm for signature references.
    pub digest: String,
    /// Symmetric content-encryption algorithm.
    pub content_encryption: String,
    /// Key-transport algorithm for the content key.
    pub key_transport: String,
    /// Canonicalization algorithm.
    pub canonicalization: String,
}

impl Default for AlgorithmSuite {
    fn default() -> Self {
        Self {
            digest: uris::SHA256.to_string(),
            content_encryption: uris::AES128_GCM.to_string(),
            key_transport: uris::RSA_OAEP_MGF1P.to_string(),
            canonicalization: uris::EXCLUSIVE_C14N.to_string(),
        }
    }
}

/// Configuration for protecting an outbound message.
pub struct OutboundProperties {
    pub(crate) actions: Vec<Action>,
    pub(crate) signature_parts: Vec<SecurePart>,
    pub(crate) encryption_parts: Vec<SecurePart>,
    pub(crate) signing_key: Option<SigningKey>,
    pub(crate) encryption_recipient: Option<RsaPublicKey>,
    pub(crate) algorithms: AlgorithmSuite,
    pub(crate) timestamp_ttl_secs: i64,
    pub(crate) registry: Arc<AlgorithmRegistry>,
    pub(crate) environment: Arc<dyn Environment>,
}

impl OutboundProperties {
    /// Empty configuration over the standard algorithm suite and the
    /// system environment.
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            signature_parts: Vec::new(),
            encryption_parts: Vec::new(),
            signing_key: None,
            encryption_recipient: None,
            algorithms: AlgorithmSuite::default(),
            timestamp_ttl_secs: 300,
            registry: AlgorithmRegistry::standard(),
            environment: Arc::new(SystemEnvironment),
        }
    }

    /// Append an action to the ordered list.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add a part to protect with the signature action.
    #[must_use]
    pub fn with_signature_part(mut self, part: SecurePart) -> Self {
        self.signature_parts.push(part);
        self
    }

    /// Add a part to protect with the encrypt action.
    #[must_use]
    pub fn with_encryption_part(mut self, part: SecurePart) -> Self {
        self.encryption_parts.push(part);
        self
    }

    /// Set the signing key.
    #[must_use]
    pub fn with_signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    /// Set the recipient public key for key transport.
    #[must_use]
    pub fn with_encryption_recipient(mut self, key: RsaPublicKey) -> Self {
        self.encryption_recipient = Some(key);
        self
    }

    /// Override the algorithm suite.
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: AlgorithmSuite) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Override the timestamp time-to-live in seconds.
    #[must_use]
    pub fn with_timestamp_ttl_secs(mut self, secs: i64) -> Self {
        self.timestamp_ttl_secs = secs;
        self
    }

    /// Override the environment (deterministic tests).
    #[must_use]
    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }
}

impl Default for OutboundProperties {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for validating an inbound message.
pub struct InboundProperties {
    pub(crate) decryption_key: Option<RsaPrivateKey>,
    pub(crate) verification_tokens: Vec<(String, VerifyingKey)>,
    pub(crate) default_verification_key: Option<VerifyingKey>,
    pub(crate) timestamp_skew_secs: i64,
    pub(crate) relay_capacity: usize,
    pub(crate) registry: Arc<AlgorithmRegistry>,
    pub(crate) environment: Arc<dyn Environment>,
}

impl InboundProperties {
    /// Empty configuration over the standard algorithm suite and the
    /// system environment.
    pub fn new() -> Self {
        Self {
            decryption_key: None,
            verification_tokens: Vec::new(),
            default_verification_key: None,
            timestamp_skew_secs: 60,
            relay_capacity: 10,
            registry: AlgorithmRegistry::standard(),
            environment: Arc::new(SystemEnvironment),
        }
    }

    /// Set the private key used to unwrap transported content keys.
    #[must_use]
    pub fn with_decryption_key(mut self, key: RsaPrivateKey) -> Self {
        self.decryption_key = Some(key);
        self
    }

    /// Pre-register a verification token under an id.
    #[must_use]
    pub fn with_verification_token(mut self, id: impl Into<String>, key: VerifyingKey) -> Self {
        self.verification_tokens.push((id.into(), key));
        self
    }

    /// Set the key used when a signature carries no key reference.
    #[must_use]
    pub fn with_default_verification_key(mut self, key: VerifyingKey) -> Self {
        self.default_verification_key = Some(key);
        self
    }

    /// Override the allowed timestamp clock skew in seconds.
    #[must_use]
    pub fn with_timestamp_skew_secs(mut self, secs: i64) -> Self {
        self.timestamp_skew_secs = secs;
        self
    }

    /// Override the relay buffer capacity.
    #[must_use]
    pub fn with_relay_capacity(mut self, capacity: usize) -> Self {
        self.relay_capacity = capacity.max(1);
        self
    }

    /// Override the environment (deterministic tests).
    #[must_use]
    pub fn with_environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = environment;
        self
    }
}

impl Default for InboundProperties {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_suite_is_the_standard_one() {
        let suite = AlgorithmSuite::default();

        assert_eq!(suite.digest, uris::SHA256);
        assert_eq!(suite.content_encryption, uris::AES128_GCM);
        assert_eq!(suite.key_transport, uris::RSA_OAEP_MGF1P);
        assert_eq!(suite.canonicalization, uris::EXCLUSIVE_C14N);
    }

    #[test]
    fn actions_keep_their_order() {
        let properties = OutboundProperties::new()
            .with_action(Action::Timestamp)
            .with_action(Action::Signature)
            .with_action(Action::Encrypt);

        assert_eq!(properties.actions, vec![Action::Timestamp, Action::Signature, Action::Encrypt]);
    }

    #[test]
    fn relay_capacity_is_at_least_one() {
        let properties = InboundProperties::new().with_relay_capacity(0);
        assert_eq!(properties.relay_capacity, 1);
    }
}
