//! Inbound validation pipeline.
//!
//! Exactly two participants: one worker thread drives the source through
//! the chain, one external consumer pulls from the relay. The chain, the
//! security context and the token registry live entirely on the worker;
//! the consumer's only information channel is the delivered event stream
//! plus the observation log returned at the end.

mod binary_token;
mod decrypt;
mod encrypted_key;
mod header;
mod signature;
mod timestamp;

use std::{cell::Cell, rc::Rc, sync::Arc, thread};

use streamseal_crypto::{AlgorithmRegistry, RsaPrivateKey, VerifyingKey};
use streamseal_xml::XmlEvent;

use crate::{
    chain::ProcessorChain,
    config::InboundProperties,
    context::SecurityContext,
    env::Environment,
    error::SecurityError,
    observe::{SecurityEvent, SecurityEventListener},
    relay::{EventReader, RelayOutputProcessor},
    token::{SecurityToken, StaticTokenProvider},
};

/// Shared configuration handed to dynamically inserted sub-processors.
pub(crate) struct InboundConfig {
    pub(crate) registry: Arc<AlgorithmRegistry>,
    pub(crate) environment: Arc<dyn Environment>,
    pub(crate) decryption_key: Option<Rc<RsaPrivateKey>>,
    pub(crate) default_verification_key: Option<VerifyingKey>,
    pub(crate) timestamp_skew_secs: i64,
}

/// Inbound validation engine for one message.
pub struct InboundSecurity {
    properties: InboundProperties,
}

impl InboundSecurity {
    /// Create the engine over a configuration.
    pub fn new(properties: InboundProperties) -> Self {
        Self { properties }
    }

    /// Start validating `source` on a worker thread.
    ///
    /// Returns the pull-style reader immediately; events become available
    /// as the worker produces them. Any chain error is surfaced to the
    /// reader as a typed result, after which the stream ends.
    pub fn process<S>(self, source: S) -> Result<EventReader, SecurityError>
    where
        S: Iterator<Item = Result<XmlEvent, SecurityError>> + Send + 'static,
    {
        self.process_with_listener(source, None)
    }

    /// Like [`InboundSecurity::process`], with an observation listener
    /// that receives each record as it is appended.
    pub fn process_with_listener<S>(
        self,
        source: S,
        listener: Option<Box<dyn SecurityEventListener>>,
    ) -> Result<EventReader, SecurityError>
    where
        S: Iterator<Item = Result<XmlEvent, SecurityError>> + Send + 'static,
    {
        let InboundProperties {
            decryption_key,
            verification_tokens,
            default_verification_key,
            timestamp_skew_secs,
            relay_capacity,
            registry,
            environment,
        } = self.properties;

        let (tx, rx) = crossbeam_channel::bounded(relay_capacity);

        let worker = thread::Builder::new()
            .name("streamseal-inbound".to_string())
            .spawn(move || {
                let closed = Rc::new(Cell::new(false));

                let mut context = SecurityContext::new();
                if let Some(listener) = listener {
                    context.set_listener(listener);
                }
                for (id, key) in verification_tokens {
                    let token = SecurityToken::verification(id.clone(), key);
                    context.register_token_provider(id, Rc::new(StaticTokenProvider::new(token)));
                }

                let config = Rc::new(InboundConfig {
                    registry,
                    environment: Arc::clone(&environment),
                    decryption_key: decryption_key.map(Rc::new),
                    default_verification_key,
                    timestamp_skew_secs,
                });

                let mut chain = ProcessorChain::new(context, environment);
                chain.append(Box::new(header::SecurityHeaderInputProcessor::new(config)));
                chain.append(Box::new(RelayOutputProcessor::new(tx.clone(), Rc::clone(&closed))));

                let result = run_chain(&mut chain, source);
                match result {
                    Ok(()) => {},
                    Err(_) if closed.get() => {
                        // Consumer dropped the reader: cancellation, not
                        // failure. Nothing left to tell anyone.
                        tracing::debug!("inbound relay closed by consumer, stopping");
                    },
                    Err(error) => {
                        let _ = tx.send(Err(error));
                    },
                }
                drop(tx);
                chain.take_events()
            })
            .map_err(|err| SecurityError::chain_state(format!("worker spawn failed: {err}")))?;

        Ok(EventReader::new(rx, worker))
    }
}

fn run_chain<S>(chain: &mut ProcessorChain, source: S) -> Result<(), SecurityError>
where
    S: Iterator<Item = Result<XmlEvent, SecurityError>>,
{
    for item in source {
        chain.process_event(item?)?;
    }
    chain.finish()
}

impl std::fmt::Debug for InboundSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundSecurity").finish_non_exhaustive()
    }
}

/// Convenience: drain a reader into the plain event list, failing on the
/// first relayed error, then join the worker for the observation log.
pub fn collect_events(
    mut reader: EventReader,
) -> Result<(Vec<XmlEvent>, Vec<SecurityEvent>), SecurityError> {
    let mut events = Vec::new();
    while let Some(item) = reader.next_event() {
        events.push(item?);
    }
    let log = reader.finish()?;
    Ok((events, log))
}
