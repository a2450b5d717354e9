//! Environment abstraction for deterministic testing.
//!
//! Decouples the engine from system resources (wall clock, randomness).
//! Timestamps are wire-visible, so the clock is UTC wall time rather than
//! a monotonic instant.

use chrono::{DateTime, Utc};
use rand::RngCore as _;

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST use cryptographically secure entropy in
/// production: `fill_random` output becomes content-encryption keys,
/// nonces and anti-oracle substitute keys.
pub trait Environment: Send + Sync {
    /// Current UTC wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Fill `buffer` with random bytes.
    fn fill_random(&self, buffer: &mut [u8]);

    /// A fresh reference id with the given prefix, e.g. `id-<uuid>`.
    fn generate_id(&self, prefix: &str) -> String {
        let mut bytes = [0u8; 16];
        self.fill_random(&mut bytes);
        format!("{prefix}-{}", uuid::Builder::from_random_bytes(bytes).into_uuid())
    }
}

/// Production environment: system clock and OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn fill_random(&self, buffer: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buffer);
    }
}
