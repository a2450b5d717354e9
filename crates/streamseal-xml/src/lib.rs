//! Streamseal Structural Event Model
//!
//! The event vocabulary shared by every Streamseal processor: qualified
//! names, attributes, namespace bindings and the `XmlEvent` union, plus the
//! exclusive-canonicalization writer used for digesting and signing.
//!
//! This crate deliberately contains no tokenizer. Producing events from raw
//! markup and serializing events back to raw markup are the job of an
//! external parser/serializer; everything in here operates on the event
//! stream only.
//!
//! # Canonical output
//!
//! [`ExclusiveCanonicalizer`] implements Exclusive XML Canonicalization 1.0
//! (comments omitted) over a single subtree of events. Its output is
//! byte-exact: two identical event sequences always canonicalize to the
//! same bytes, which is what makes streamed digests interoperable.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod c14n;
pub mod error;
pub mod event;
pub mod name;

pub use c14n::ExclusiveCanonicalizer;
pub use error::CanonicalError;
pub use event::{Attribute, Characters, EndElement, NamespaceBinding, StartElement, XmlEvent};
pub use name::QName;
