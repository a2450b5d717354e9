//! Relay bridge behavior: backpressure, error surfacing, cancellation.

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use common::{source, test_env};
use streamseal_core::{InboundProperties, InboundSecurity, SecurityError};
use streamseal_xml::{QName, XmlEvent};

/// A source that counts how many events the worker has pulled and flags
/// when the worker dropped it.
struct CountingSource {
    events: std::vec::IntoIter<XmlEvent>,
    pulled: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Iterator for CountingSource {
    type Item = Result<XmlEvent, SecurityError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.events.next()?;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Some(Ok(next))
    }
}

impl Drop for CountingSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

fn plain_events(count: usize) -> Vec<XmlEvent> {
    let name = QName::local("Doc");
    let mut events = vec![XmlEvent::start(name.clone())];
    for index in 0..count {
        events.push(XmlEvent::text(format!("event-{index}")));
    }
    events.push(XmlEvent::end(name));
    events
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}

#[test]
fn capacity_one_blocks_the_worker_until_the_consumer_drains() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicBool::new(false));
    let counting = CountingSource {
        events: plain_events(8).into_iter(),
        pulled: Arc::clone(&pulled),
        dropped: Arc::clone(&dropped),
    };

    let mut reader = InboundSecurity::new(
        InboundProperties::new().with_environment(test_env(1)).with_relay_capacity(1),
    )
    .process(counting)
    .unwrap();

    // With nothing consumed, the worker fills the single slot and blocks
    // on the next send: it can never run far ahead.
    thread::sleep(Duration::from_millis(100));
    let stalled_at = pulled.load(Ordering::SeqCst);
    assert!(stalled_at <= 2, "worker ran ahead of a full relay: {stalled_at}");

    // Draining one event unblocks exactly the next send.
    let first = reader.next_event().unwrap().unwrap();
    assert!(first.is_start());
    assert!(wait_until(Duration::from_secs(2), || pulled.load(Ordering::SeqCst) > stalled_at));

    // Draining everything lets the worker finish.
    while let Some(item) = reader.next_event() {
        item.unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || dropped.load(Ordering::SeqCst)));
    reader.finish().unwrap();
}

#[test]
fn worker_error_is_surfaced_on_the_next_read() {
    let events = vec![
        Ok(XmlEvent::start(QName::local("Doc"))),
        Ok(XmlEvent::text("fine")),
        Err(SecurityError::parse("truncated input")),
    ];

    let mut reader = InboundSecurity::new(InboundProperties::new().with_environment(test_env(2)))
        .process(events.into_iter())
        .unwrap();

    let mut seen_error = None;
    let mut delivered = 0usize;
    while let Some(item) = reader.next_event() {
        match item {
            Ok(_) => delivered += 1,
            Err(error) => {
                seen_error = Some(error);
                break;
            },
        }
    }

    assert_eq!(delivered, 2);
    assert!(matches!(seen_error, Some(SecurityError::Parse { .. })));
    // After an error the stream is over.
    assert!(reader.next_event().is_none());
}

#[test]
fn dropping_the_reader_cancels_the_worker() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicBool::new(false));
    let counting = CountingSource {
        events: plain_events(500).into_iter(),
        pulled: Arc::clone(&pulled),
        dropped: Arc::clone(&dropped),
    };

    let reader = InboundSecurity::new(
        InboundProperties::new().with_environment(test_env(3)).with_relay_capacity(1),
    )
    .process(counting)
    .unwrap();

    drop(reader);

    // The worker observes closure on its next send and stops without
    // draining the source.
    assert!(wait_until(Duration::from_secs(2), || dropped.load(Ordering::SeqCst)));
    assert!(pulled.load(Ordering::SeqCst) < 500);
}

#[test]
fn events_arrive_in_chain_order() {
    let events = plain_events(32);
    let reader = InboundSecurity::new(InboundProperties::new().with_environment(test_env(4)))
        .process(source(events.clone()))
        .unwrap();

    let (delivered, _log) = streamseal_core::collect_events(reader).unwrap();
    assert_eq!(delivered, events);
}
