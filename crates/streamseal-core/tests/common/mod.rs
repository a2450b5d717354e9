//! Shared support for the integration tests: a deterministic
//! environment, test key material and small event-list helpers.

// Not every test file uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex, OnceLock};

use chrono::{DateTime, TimeZone, Utc};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use streamseal_core::Environment;
use streamseal_crypto::{DigestAccumulator, RsaPrivateKey, uris};
use streamseal_xml::{ExclusiveCanonicalizer, QName, StartElement, XmlEvent};

/// Fixed clock + seeded entropy.
pub struct TestEnvironment {
    now: DateTime<Utc>,
    rng: Mutex<StdRng>,
}

impl TestEnvironment {
    pub fn new(seed: u64) -> Self {
        Self { now: test_instant(), rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    pub fn at(seed: u64, now: DateTime<Utc>) -> Self {
        Self { now, rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Environment for TestEnvironment {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn fill_random(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap().fill_bytes(buffer);
    }
}

pub fn test_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 12, 0, 0).unwrap()
}

pub fn test_env(seed: u64) -> Arc<TestEnvironment> {
    Arc::new(TestEnvironment::new(seed))
}

/// RSA test keys are expensive to generate; share them across tests.
pub fn test_rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(41);
        RsaPrivateKey::new(&mut rng, 1024).unwrap()
    })
}

pub fn other_rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(42);
        RsaPrivateKey::new(&mut rng, 1024).unwrap()
    })
}

pub const NS_EXAMPLE: &str = "urn:example";

pub fn envelope_name() -> QName {
    QName::new(NS_EXAMPLE, "Envelope", "ex")
}

pub fn body_name() -> QName {
    QName::new(NS_EXAMPLE, "Body", "ex")
}

/// `<ex:Envelope><ex:Body>{text}</ex:Body></ex:Envelope>` as events.
pub fn envelope_with_body(text: &str) -> Vec<XmlEvent> {
    vec![
        XmlEvent::start(envelope_name()),
        XmlEvent::start(body_name()),
        XmlEvent::text(text),
        XmlEvent::end(body_name()),
        XmlEvent::end(envelope_name()),
    ]
}

/// First start element with the given expanded name.
pub fn find_start<'a>(
    events: &'a [XmlEvent],
    namespace_uri: &str,
    local_name: &str,
) -> Option<&'a StartElement> {
    events
        .iter()
        .find_map(|event| event.as_start().filter(|s| s.name.matches(namespace_uri, local_name)))
}

/// The event range of the first element with the given expanded name,
/// start and end inclusive.
pub fn subtree(events: &[XmlEvent], namespace_uri: &str, local_name: &str) -> Vec<XmlEvent> {
    let Some(from) = events.iter().position(|event| {
        event.as_start().is_some_and(|s| s.name.matches(namespace_uri, local_name))
    }) else {
        return Vec::new();
    };

    let mut depth = 0usize;
    let mut out = Vec::new();
    for event in &events[from..] {
        if event.is_start() {
            depth += 1;
        }
        out.push(event.clone());
        if event.is_end() {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
    }
    out
}

/// Text content concatenated over an element's subtree.
pub fn subtree_text(events: &[XmlEvent], namespace_uri: &str, local_name: &str) -> String {
    subtree(events, namespace_uri, local_name)
        .iter()
        .filter_map(|event| event.as_characters())
        .collect()
}

/// Exclusive canonical bytes of an event list.
pub fn canonical_bytes(events: &[XmlEvent]) -> Vec<u8> {
    let mut canonicalizer = ExclusiveCanonicalizer::default_transform();
    let mut out = Vec::new();
    for event in events {
        canonicalizer.write_event(event, &mut out).unwrap();
    }
    out
}

/// SHA-256 of an event list's canonical form.
pub fn canonical_digest(events: &[XmlEvent]) -> Vec<u8> {
    use std::io::Write as _;

    let mut digest = DigestAccumulator::for_uri(uris::SHA256).unwrap();
    digest.write_all(&canonical_bytes(events)).unwrap();
    digest.finalize()
}

/// A source iterator over owned events, as the inbound engine expects.
pub fn source(
    events: Vec<XmlEvent>,
) -> impl Iterator<Item = Result<XmlEvent, streamseal_core::SecurityError>> + Send + 'static {
    events.into_iter().map(Ok)
}
