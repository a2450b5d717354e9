//! Observation records.
//!
//! Immutable facts about what the engine did to a message ("this part was
//! signed", "this token was recognized"), appended to an ordered log and
//! forwarded to an optional listener during inbound processing. The
//! engine itself never reads them back; they exist for an external
//! policy-assertion component.

use chrono::{DateTime, Utc};
use streamseal_xml::QName;

use crate::token::KeyIdentifier;

/// One observation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A protection/validation operation ran.
    Operation {
        /// Operation label, e.g. `"timestamp"`, `"signature"`.
        operation: &'static str,
    },

    /// A timestamp was validated.
    TimestampValidated {
        /// The creation instant from the message.
        created: DateTime<Utc>,
        /// The expiry instant from the message.
        expires: DateTime<Utc>,
    },

    /// A referenced part's digest matched.
    SignedPart {
        /// Name of the signed element.
        name: QName,
        /// The reference id that tied it to the signature.
        reference_id: String,
    },

    /// A signature value verified over its signed-info block.
    SignatureVerified {
        /// Number of references the signature covers.
        reference_count: usize,
    },

    /// An encrypted part was decrypted, whole-element coverage.
    EncryptedPart {
        /// Name of the recovered element.
        name: QName,
        /// The data reference id.
        reference_id: String,
    },

    /// An encrypted part was decrypted, content-only coverage.
    ContentEncrypted {
        /// The data reference id.
        reference_id: String,
    },

    /// An algorithm was selected for a purpose.
    AlgorithmSuite {
        /// What the algorithm was used for, e.g. `"signature"`.
        purpose: &'static str,
        /// The algorithm URI.
        uri: String,
    },

    /// A security token was recognized and registered.
    TokenRecognized {
        /// The token id.
        id: String,
        /// How the token was identified on the wire.
        key_identifier: KeyIdentifier,
    },
}

/// Receives observation records as they are appended.
pub trait SecurityEventListener: Send {
    /// Called once per record, in order.
    fn on_security_event(&mut self, event: &SecurityEvent);
}

impl<F> SecurityEventListener for F
where
    F: FnMut(&SecurityEvent) + Send,
{
    fn on_security_event(&mut self, event: &SecurityEvent) {
        self(event);
    }
}
