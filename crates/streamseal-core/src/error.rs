//! Error types for the streaming security engine.
//!
//! One taxonomy for the whole engine: processors fail with a
//! [`SecurityError`], the chain aborts at the first failure, and the
//! inbound relay carries the original error to the consumer as a value.
//! Leaf-crate errors convert at the boundary so callers never see a raw
//! crypto or canonicalization error.

use streamseal_crypto::CryptoError;
use streamseal_xml::CanonicalError;
use thiserror::Error;

/// Errors raised while protecting or validating a message stream.
#[derive(Error, Debug)]
pub enum SecurityError {
    /// The event stream or an embedded structure could not be understood.
    #[error("parse failure: {message}")]
    Parse {
        /// What could not be parsed.
        message: String,
    },

    /// An algorithm URI outside the supported suite.
    #[error("unsupported algorithm: {uri}")]
    UnsupportedAlgorithm {
        /// The offending algorithm URI.
        uri: String,
    },

    /// The document violates the security profile (missing required
    /// structure, inconsistent methods, expired timestamp).
    #[error("invalid security: {reason}")]
    InvalidSecurity {
        /// The violated requirement.
        reason: String,
    },

    /// A cryptographic check failed: signature or digest mismatch, or a
    /// decryption that did not yield usable plaintext.
    #[error("security check failed: {reason}")]
    FailedCheck {
        /// Which check failed. Never distinguishes failure causes an
        /// attacker could exploit.
        reason: String,
    },

    /// A referenced security token is not registered.
    #[error("security token not found: {id}")]
    TokenNotFound {
        /// The unresolved token id.
        id: String,
    },

    /// Contract violation on the processor chain itself - reusing a
    /// finished or failed chain. Fatal and internal.
    #[error("chain state violation: {reason}")]
    ChainState {
        /// The violated contract.
        reason: String,
    },
}

impl SecurityError {
    /// Shorthand for a [`SecurityError::Parse`].
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    /// Shorthand for a [`SecurityError::InvalidSecurity`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidSecurity { reason: reason.into() }
    }

    /// Shorthand for a [`SecurityError::FailedCheck`].
    pub fn failed_check(reason: impl Into<String>) -> Self {
        Self::FailedCheck { reason: reason.into() }
    }

    /// Shorthand for a [`SecurityError::ChainState`].
    pub fn chain_state(reason: impl Into<String>) -> Self {
        Self::ChainState { reason: reason.into() }
    }
}

impl From<CanonicalError> for SecurityError {
    fn from(err: CanonicalError) -> Self {
        Self::Parse { message: err.to_string() }
    }
}

impl From<CryptoError> for SecurityError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnsupportedAlgorithm { uri } => Self::UnsupportedAlgorithm { uri },
            CryptoError::VerificationFailed | CryptoError::DecryptFailed => {
                Self::FailedCheck { reason: "cryptographic check failed".to_string() }
            },
            CryptoError::InvalidKey { reason }
            | CryptoError::SignatureFailed { reason }
            | CryptoError::EncryptFailed { reason } => Self::FailedCheck { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_failures_collapse_to_failed_check() {
        let verify: SecurityError = CryptoError::VerificationFailed.into();
        let decrypt: SecurityError = CryptoError::DecryptFailed.into();

        // Same variant and same reason: nothing distinguishes a bad
        // signature from a bad decryption at this level.
        assert!(matches!(&verify, SecurityError::FailedCheck { reason } if reason == "cryptographic check failed"));
        assert!(matches!(&decrypt, SecurityError::FailedCheck { reason } if reason == "cryptographic check failed"));
    }

    #[test]
    fn unsupported_algorithm_keeps_the_uri() {
        let err: SecurityError =
            CryptoError::UnsupportedAlgorithm { uri: "urn:x".to_string() }.into();
        assert!(matches!(err, SecurityError::UnsupportedAlgorithm { uri } if uri == "urn:x"));
    }

    #[test]
    fn canonical_errors_become_parse_errors() {
        let err: SecurityError =
            CanonicalError::UnbalancedElement { name: "Body".to_string() }.into();
        assert!(matches!(err, SecurityError::Parse { .. }));
    }
}
