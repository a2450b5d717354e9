//! Incremental digest sink.
//!
//! A canonicalizer writes a subtree's canonical bytes straight into this
//! accumulator; the subtree is digested as it streams and never
//! materialized.

use std::io::{self, Write};

use sha2::{Digest, Sha256};

use crate::{algorithms::uris, error::CryptoError};

/// Incrementally computes a digest over everything written into it.
#[derive(Debug)]
pub struct DigestAccumulator {
    hasher: Sha256,
}

impl DigestAccumulator {
    /// Create an accumulator for the given digest algorithm URI.
    pub fn for_uri(uri: &str) -> Result<Self, CryptoError> {
        match uri {
            uris::SHA256 => Ok(Self { hasher: Sha256::new() }),
            other => Err(CryptoError::UnsupportedAlgorithm { uri: other.to_string() }),
        }
    }

    /// Consume the accumulator and return the digest bytes.
    pub fn finalize(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl Write for DigestAccumulator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
