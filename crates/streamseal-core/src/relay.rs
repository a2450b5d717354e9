//! The inbound relay bridge.
//!
//! The inbound chain is push-driven and needs subtree-scoped lookahead,
//! which a single-threaded pull interface cannot provide. The bridge runs
//! the chain on one dedicated worker thread whose terminal processor
//! writes into a bounded channel; the external consumer pulls from the
//! other end.
//!
//! - The consumer blocks on an empty relay; the worker blocks on a full
//!   one (backpressure).
//! - The worker's terminal outcome travels on the same channel as the
//!   events: a typed error message, then channel closure. No panic ever
//!   crosses the thread boundary.
//! - Dropping the reader closes the relay; the worker observes closure on
//!   its next send and stops without completing the chain, so no
//!   partially computed security material is ever surfaced.

use std::{cell::Cell, rc::Rc, thread::JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use streamseal_xml::XmlEvent;

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    observe::SecurityEvent,
};

/// What travels through the relay.
pub(crate) type RelayItem = Result<XmlEvent, SecurityError>;

/// Terminal processor of the inbound chain: writes events into the relay.
pub(crate) struct RelayOutputProcessor {
    tx: Sender<RelayItem>,
    /// Set when the consumer side has gone away; the worker checks it to
    /// distinguish cancellation from failure.
    closed: Rc<Cell<bool>>,
}

impl RelayOutputProcessor {
    pub(crate) fn new(tx: Sender<RelayItem>, closed: Rc<Cell<bool>>) -> Self {
        Self { tx, closed }
    }
}

impl Processor for RelayOutputProcessor {
    fn name(&self) -> &'static str {
        "relay-output"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        _ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if self.tx.send(Ok(event)).is_err() {
            self.closed.set(true);
            return Err(SecurityError::chain_state("relay closed by consumer"));
        }
        Ok(())
    }
}

/// Pull-style consumer end of the inbound relay.
///
/// Yields the validated/decrypted event stream in exactly the order the
/// chain produced it. After an error is yielded, the stream ends. Call
/// [`EventReader::finish`] after draining to join the worker and obtain
/// the observation log.
pub struct EventReader {
    rx: Option<Receiver<RelayItem>>,
    worker: Option<JoinHandle<Vec<SecurityEvent>>>,
    done: bool,
}

impl EventReader {
    pub(crate) fn new(rx: Receiver<RelayItem>, worker: JoinHandle<Vec<SecurityEvent>>) -> Self {
        Self { rx: Some(rx), worker: Some(worker), done: false }
    }

    /// The next event, blocking while the relay is empty.
    ///
    /// `None` means end of stream: the worker finished (or an error was
    /// already yielded).
    pub fn next_event(&mut self) -> Option<RelayItem> {
        if self.done {
            return None;
        }
        let Some(rx) = self.rx.as_ref() else {
            return None;
        };
        match rx.recv() {
            Ok(Ok(event)) => Some(Ok(event)),
            Ok(Err(error)) => {
                self.done = true;
                Some(Err(error))
            },
            Err(_) => {
                self.done = true;
                None
            },
        }
    }

    /// Join the worker and return the observation log.
    ///
    /// Closes the relay first, so a worker still producing stops instead
    /// of deadlocking; drain the reader before calling this if the
    /// remaining events matter.
    pub fn finish(mut self) -> Result<Vec<SecurityEvent>, SecurityError> {
        drop(self.rx.take());
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| SecurityError::chain_state("inbound worker panicked")),
            None => Ok(Vec::new()),
        }
    }
}

impl Iterator for EventReader {
    type Item = RelayItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

impl std::fmt::Debug for EventReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventReader").field("done", &self.done).finish()
    }
}
