//! Streamseal Cryptographic Primitives
//!
//! The capability layer the streaming processors call into: an immutable
//! algorithm-URI registry, an incremental digest sink, sign/verify keys,
//! an AEAD content cipher and RSA-OAEP key transport.
//!
//! Everything here is one-shot or incremental-by-`Write`; nothing holds a
//! document. Algorithm identification is by standard URI throughout -
//! callers never name a primitive directly, they resolve a URI against
//! [`AlgorithmRegistry`] and get back the key length and kind they need.
//!
//! # Security
//!
//! - Symmetric key bytes ([`SymmetricSecret`], HMAC secrets, unwrapped
//!   transport keys) are zeroized on drop.
//! - Decryption failures ([`CryptoError::DecryptFailed`]) carry no detail:
//!   a bad transport key and a bad content key are indistinguishable at
//!   the error level, which the engine's anti-oracle defense relies on.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithms;
pub mod cipher;
pub mod digest;
pub mod error;
pub mod secret;
pub mod sign;
pub mod transport;

pub use algorithms::{AlgorithmKind, AlgorithmRegistry, AlgorithmSpec, uris};
pub use cipher::{NONCE_SIZE, open, seal};
pub use digest::DigestAccumulator;
pub use error::CryptoError;
pub use secret::SymmetricSecret;
pub use sign::{KeyEncoding, SigningKey, VerifyingKey};
pub use transport::{unwrap_key, wrap_key};

// Re-exported so the engine can hold RSA key material without a direct
// dependency on the rsa crate's version.
pub use rsa::{RsaPrivateKey, RsaPublicKey};
