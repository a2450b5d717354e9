//! Streamseal Streaming Security Engine
//!
//! Wire-level cryptographic protection (signature, encryption,
//! timestamping) for structured markup messages, applied as the message
//! streams past rather than after being materialized. The engine
//! reproduces whole-document semantics - a signature over a subtree,
//! encryption of an element - while holding only a bounded window of the
//! document, by routing every event through a mutable chain of
//! processors that insert and remove each other as they observe the
//! stream.
//!
//! # Outbound
//!
//! [`OutboundSecurity`] is fully synchronous: the caller pushes events,
//! processors digest/encipher subtrees incrementally, and the ending
//! processors append the signature and encrypted-key blocks into the
//! security header at [`OutboundSecurity::finish`].
//!
//! ```no_run
//! use streamseal_core::{Action, OutboundProperties, OutboundSecurity, SecurePart};
//! use streamseal_crypto::SigningKey;
//! use streamseal_xml::{QName, XmlEvent};
//!
//! # fn main() -> Result<(), streamseal_core::SecurityError> {
//! let properties = OutboundProperties::new()
//!     .with_action(Action::Signature)
//!     .with_signature_part(SecurePart::element("urn:example", "Body"))
//!     .with_signing_key(SigningKey::hmac(b"shared secret".to_vec()));
//!
//! let output: Vec<XmlEvent> = Vec::new();
//! {
//!     let mut outbound = OutboundSecurity::new(properties, Box::new(output))?;
//!     outbound.push(XmlEvent::start(QName::new("urn:example", "Envelope", "ex")))?;
//!     outbound.push(XmlEvent::start(QName::new("urn:example", "Body", "ex")))?;
//!     outbound.push(XmlEvent::text("payload"))?;
//!     outbound.push(XmlEvent::end(QName::new("urn:example", "Body", "ex")))?;
//!     outbound.push(XmlEvent::end(QName::new("urn:example", "Envelope", "ex")))?;
//!     outbound.finish()?;
//! }
//! # Ok(()) }
//! ```
//!
//! # Inbound
//!
//! [`InboundSecurity`] runs the chain on a dedicated worker behind a
//! bounded relay; the returned [`EventReader`] is a plain pull-style
//! iterator. Errors cross the thread boundary as typed values, never as
//! panics.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chain;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
mod fragment;
pub mod inbound;
pub mod names;
pub mod observe;
pub mod outbound;
pub mod relay;
pub mod token;

pub use chain::{ChainContext, Processor, ProcessorChain};
pub use config::{Action, AlgorithmSuite, Coverage, InboundProperties, OutboundProperties, SecurePart};
pub use context::SecurityContext;
pub use env::{Environment, SystemEnvironment};
pub use error::SecurityError;
pub use inbound::{InboundSecurity, collect_events};
pub use observe::{SecurityEvent, SecurityEventListener};
pub use outbound::{EventSink, OutboundSecurity};
pub use relay::EventReader;
pub use token::{
    DelegatedToken, KeyIdentifier, SecretBytes, SecurityToken, StaticTokenProvider, TokenProvider,
};
