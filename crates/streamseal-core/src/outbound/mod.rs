//! Outbound protection pipeline.
//!
//! Fully synchronous: the caller pushes every event through the chain and
//! finishes it after the last one. Any lookahead a protection needs is
//! local buffering inside an active sub-processor, never concurrency.

mod encrypt;
mod header;
mod signature;

use std::rc::Rc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::{AlgorithmKind, SymmetricSecret, wrap_key};
use streamseal_xml::XmlEvent;

use crate::{
    chain::{ChainContext, Processor, ProcessorChain},
    config::{Action, OutboundProperties},
    context::SecurityContext,
    error::SecurityError,
    names,
};

pub(crate) use header::{BinaryTokenEmit, SecurityHeaderOutputProcessor};

/// Receives the protected event stream. The external serializer side of
/// the engine.
pub trait EventSink {
    /// Accept the next output event.
    fn accept(&mut self, event: XmlEvent) -> Result<(), SecurityError>;
}

impl EventSink for Vec<XmlEvent> {
    fn accept(&mut self, event: XmlEvent) -> Result<(), SecurityError> {
        self.push(event);
        Ok(())
    }
}

/// Shared collector, for callers that need the output back after the
/// engine consumed the sink.
impl EventSink for Rc<std::cell::RefCell<Vec<XmlEvent>>> {
    fn accept(&mut self, event: XmlEvent) -> Result<(), SecurityError> {
        self.borrow_mut().push(event);
        Ok(())
    }
}

/// Terminal processor: hands every event to the caller's sink.
struct FinalOutputProcessor {
    sink: Box<dyn EventSink>,
}

impl Processor for FinalOutputProcessor {
    fn name(&self) -> &'static str {
        "final-output"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        _ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        self.sink.accept(event)
    }
}

/// Outbound protection engine for one message.
///
/// Assembles the processor chain from the configured action list, then
/// routes every pushed event through it. [`OutboundSecurity::finish`]
/// must be called after the final event so the ending processors can
/// emit their blocks.
pub struct OutboundSecurity {
    chain: ProcessorChain,
}

impl OutboundSecurity {
    /// Assemble the outbound chain for one message.
    ///
    /// # Errors
    ///
    /// `InvalidSecurity` for inconsistent configuration (a signature
    /// action without a signing key, an encrypt action without a
    /// recipient key, duplicate actions); `UnsupportedAlgorithm` if the
    /// configured suite does not resolve.
    pub fn new(
        properties: OutboundProperties,
        sink: Box<dyn EventSink>,
    ) -> Result<Self, SecurityError> {
        let OutboundProperties {
            actions,
            signature_parts,
            encryption_parts,
            signing_key,
            encryption_recipient,
            algorithms,
            timestamp_ttl_secs,
            registry,
            environment,
        } = properties;

        let signature_count = actions.iter().filter(|a| **a == Action::Signature).count();
        let encrypt_count = actions.iter().filter(|a| **a == Action::Encrypt).count();
        if signature_count > 1 || encrypt_count > 1 {
            return Err(SecurityError::invalid("duplicate protection action"));
        }

        let mut signature_setup = None;
        if signature_count == 1 {
            let key = signing_key
                .ok_or_else(|| SecurityError::invalid("signature action without a signing key"))?;
            registry.require(&algorithms.digest, AlgorithmKind::Digest)?;
            registry.require(&algorithms.canonicalization, AlgorithmKind::Canonicalization)?;

            // HMAC keys never go on the wire; asymmetric keys travel as a
            // binary token the signature's key info points at.
            let binary_token = match key.verifying_key().export() {
                Ok((encoding, bytes)) => Some(BinaryTokenEmit {
                    id: environment.generate_id("bst"),
                    value_type: names::value_type_for(encoding).to_string(),
                    encoded: STANDARD.encode(bytes),
                }),
                Err(_) => None,
            };
            signature_setup = Some((key, binary_token));
        }

        let mut encrypt_setup = None;
        if encrypt_count == 1 {
            let recipient = encryption_recipient
                .ok_or_else(|| SecurityError::invalid("encrypt action without a recipient key"))?;
            registry.require(&algorithms.key_transport, AlgorithmKind::KeyTransport)?;
            let key_len = registry.key_len(&algorithms.content_encryption)?;

            let mut key_bytes = vec![0u8; key_len];
            environment.fill_random(&mut key_bytes);
            let wrapped = wrap_key(&recipient, &key_bytes)?;
            let secret =
                Rc::new(SymmetricSecret::new(key_bytes, algorithms.content_encryption.clone()));
            encrypt_setup = Some((secret, wrapped));
        }

        let mut chain = ProcessorChain::new(SecurityContext::new(), environment.clone());

        chain.append(Box::new(SecurityHeaderOutputProcessor::new(
            actions.contains(&Action::Timestamp),
            timestamp_ttl_secs,
            signature_setup.as_ref().and_then(|(_, bst)| bst.clone()),
        )));

        for action in &actions {
            match action {
                Action::Signature => {
                    chain.append(Box::new(signature::SignatureOutputProcessor::new(
                        signature_parts.clone(),
                        algorithms.digest.clone(),
                        algorithms.canonicalization.clone(),
                    )));
                },
                Action::Encrypt => {
                    if let Some((secret, _)) = &encrypt_setup {
                        chain.append(Box::new(encrypt::EncryptOutputProcessor::new(
                            encryption_parts.clone(),
                            Rc::clone(secret),
                        )));
                    }
                },
                Action::Timestamp => {},
            }
        }

        for action in &actions {
            match action {
                Action::Signature => {
                    if let Some((key, binary_token)) = signature_setup.take() {
                        chain.append(Box::new(signature::SignatureEndingOutputProcessor::new(
                            key,
                            algorithms.canonicalization.clone(),
                            binary_token,
                        )));
                    }
                },
                Action::Encrypt => {
                    if let Some((_, wrapped)) = encrypt_setup.take() {
                        chain.append(Box::new(encrypt::EncryptEndingOutputProcessor::new(
                            wrapped,
                            algorithms.key_transport.clone(),
                            environment.generate_id("ek"),
                        )));
                    }
                },
                Action::Timestamp => {},
            }
        }

        chain.append(Box::new(FinalOutputProcessor { sink }));

        Ok(Self { chain })
    }

    /// Route one message event through the protection chain.
    pub fn push(&mut self, event: XmlEvent) -> Result<(), SecurityError> {
        self.chain.process_event(event)
    }

    /// Finish the message: ending processors emit their security blocks
    /// and flush their buffers into the sink.
    pub fn finish(mut self) -> Result<(), SecurityError> {
        self.chain.finish()
    }
}

impl std::fmt::Debug for OutboundSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundSecurity").field("chain", &self.chain).finish()
    }
}
