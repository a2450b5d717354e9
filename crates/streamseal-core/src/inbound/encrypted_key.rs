//! Inbound key transport.
//!
//! Collects the bounded `xenc:EncryptedKey` element (states: collecting →
//! complete → resolved), unwraps the transported content key with the
//! configured private key and registers the outcome as a token provider
//! under the element's id. When the element names later encrypted-data
//! references, a decrypt processor is installed for them.
//!
//! # Anti-oracle defense
//!
//! A transport-key decryption failure is NOT surfaced here. The shared
//! key cell is poisoned instead; the first referenced encrypted-data
//! element sizes a freshly generated random key, and the observable
//! failure happens at symmetric decryption - the same failure an attacker
//! sees for a wrong content key. Error type and timing class never reveal
//! which step actually failed.

use std::{cell::RefCell, rc::Rc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::{AlgorithmKind, unwrap_key};
use streamseal_xml::XmlEvent;

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    fragment::{ElementCollector, Fragment},
    inbound::{InboundConfig, decrypt::DecryptInputProcessor},
    names,
    observe::SecurityEvent,
    token::{KeyIdentifier, SecretBytes, SecurityToken, TokenProvider},
};

/// Outcome of the key-transport step, shared between the registered
/// provider and the decrypt processor.
pub(crate) enum KeyCell {
    /// The content key bytes (unwrapped, or the substitute).
    Unwrapped(SecretBytes),
    /// Transport failed; a substitute will be generated at first use.
    Poisoned,
}

impl KeyCell {
    /// The key bytes, generating the substitute on first use.
    ///
    /// `key_len` is the size implied by the consumer's declared algorithm
    /// (the first referenced encrypted-data element, or the AES-128
    /// default for other consumers).
    pub(crate) fn resolve(
        cell: &Rc<RefCell<KeyCell>>,
        key_len: usize,
        config: &InboundConfig,
    ) -> Vec<u8> {
        let mut guard = cell.borrow_mut();
        match &*guard {
            KeyCell::Unwrapped(bytes) => bytes.as_slice().to_vec(),
            KeyCell::Poisoned => {
                tracing::debug!("substituting random content key after transport failure");
                let mut bytes = vec![0u8; key_len];
                config.environment.fill_random(&mut bytes);
                let out = bytes.clone();
                *guard = KeyCell::Unwrapped(SecretBytes::new(bytes));
                out
            },
        }
    }
}

/// Provider registered under the encrypted-key element's id.
struct TransportedKeyProvider {
    id: String,
    cell: Rc<RefCell<KeyCell>>,
    config: Rc<InboundConfig>,
}

impl TokenProvider for TransportedKeyProvider {
    fn token(&self) -> Result<Rc<SecurityToken>, SecurityError> {
        // Consumers that resolve before any referenced encrypted-data
        // element has declared an algorithm get the default sizing.
        let bytes = KeyCell::resolve(&self.cell, 16, &self.config);
        Ok(Rc::new(SecurityToken::symmetric(self.id.clone(), bytes)))
    }
}

pub(crate) struct EncryptedKeyInputProcessor {
    config: Rc<InboundConfig>,
    collector: Option<ElementCollector>,
}

impl EncryptedKeyInputProcessor {
    pub(crate) fn new(config: Rc<InboundConfig>) -> Self {
        Self { config, collector: None }
    }

    fn resolve(&self, ctx: &mut ChainContext<'_>, events: &[XmlEvent]) -> Result<(), SecurityError> {
        let fragment = Fragment::parse(events)?;

        let transport_uri = fragment
            .require_child(names::NS_XENC, "EncryptionMethod")?
            .require_attribute("", "Algorithm")?;
        self.config.registry.require(transport_uri, AlgorithmKind::KeyTransport)?;

        let cipher_value = fragment
            .require_child(names::NS_XENC, "CipherData")?
            .require_child(names::NS_XENC, "CipherValue")?
            .trimmed_text();
        let wrapped = STANDARD
            .decode(cipher_value)
            .map_err(|_| SecurityError::invalid("malformed key transport cipher value"))?;

        let private_key = self
            .config
            .decryption_key
            .as_ref()
            .ok_or_else(|| SecurityError::failed_check("no decryption key available"))?;

        let cell = match unwrap_key(private_key, &wrapped) {
            Ok(bytes) => {
                Rc::new(RefCell::new(KeyCell::Unwrapped(SecretBytes::new(bytes.to_vec()))))
            },
            Err(_) => {
                // Deliberately deferred: see the anti-oracle note above.
                tracing::debug!("key transport decryption failed, deferring failure");
                Rc::new(RefCell::new(KeyCell::Poisoned))
            },
        };

        if let Some(id) = fragment.attribute("", "Id") {
            let provider = TransportedKeyProvider {
                id: id.to_string(),
                cell: Rc::clone(&cell),
                config: Rc::clone(&self.config),
            };
            let security_context = ctx.security_context_mut();
            security_context.register_token_provider(id, Rc::new(provider));
            security_context.record(SecurityEvent::TokenRecognized {
                id: id.to_string(),
                key_identifier: KeyIdentifier::EmbeddedSecret,
            });
        }

        if let Some(list) = fragment.child(names::NS_XENC, "ReferenceList") {
            let references: Vec<String> = list
                .children_named(names::NS_XENC, "DataReference")
                .filter_map(|reference| reference.attribute("", "URI"))
                .map(|uri| names::fragment_id(uri).to_string())
                .collect();
            if !references.is_empty() {
                ctx.insert_after_self(Box::new(DecryptInputProcessor::new(
                    references,
                    cell,
                    Rc::clone(&self.config),
                )));
            }
        }

        ctx.security_context_mut().record(SecurityEvent::Operation { operation: "encrypted-key" });
        Ok(())
    }
}

impl Processor for EncryptedKeyInputProcessor {
    fn name(&self) -> &'static str {
        "encrypted-key-input"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        let Some(collector) = self.collector.as_mut() else {
            if let XmlEvent::StartElement(start) = &event {
                self.collector = Some(ElementCollector::begin(start));
            }
            return ctx.forward(event);
        };

        let complete = collector.push(event.clone());
        ctx.forward(event)?;

        if complete {
            let Some(collector) = self.collector.take() else {
                return Ok(());
            };
            self.resolve(ctx, collector.events())?;
            ctx.remove_self();
        }
        Ok(())
    }
}
