//! Inbound content decryption.
//!
//! Installed by the encrypted-key processor for the references its
//! element named. Each matching `xenc:EncryptedData` element is consumed
//! from the stream; its cipher value is opened with the transported (or
//! substitute) key and the recovered plaintext events take its place,
//! flowing through this processor again first so nested encrypted
//! content is handled too.

use std::{cell::RefCell, rc::Rc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::{AlgorithmKind, SymmetricSecret, open};
use streamseal_xml::XmlEvent;

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    fragment::{ElementCollector, Fragment},
    inbound::{InboundConfig, encrypted_key::KeyCell},
    names,
    observe::SecurityEvent,
};

pub(crate) struct DecryptInputProcessor {
    config: Rc<InboundConfig>,
    /// Reference ids named by the encrypted-key element, not yet seen.
    pending: Vec<String>,
    cell: Rc<RefCell<KeyCell>>,
    collecting: Option<ElementCollector>,
}

impl DecryptInputProcessor {
    pub(crate) fn new(
        pending: Vec<String>,
        cell: Rc<RefCell<KeyCell>>,
        config: Rc<InboundConfig>,
    ) -> Self {
        Self { config, pending, cell, collecting: None }
    }

    fn process_encrypted(
        &mut self,
        events: &[XmlEvent],
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        let fragment = Fragment::parse(events)?;

        let algorithm = fragment
            .require_child(names::NS_XENC, "EncryptionMethod")?
            .require_attribute("", "Algorithm")?;
        self.config.registry.require(algorithm, AlgorithmKind::ContentEncryption)?;

        let cipher_value = fragment
            .require_child(names::NS_XENC, "CipherData")?
            .require_child(names::NS_XENC, "CipherValue")?
            .trimmed_text();
        let data = STANDARD
            .decode(cipher_value)
            .map_err(|_| SecurityError::invalid("malformed encrypted data cipher value"))?;

        // The declared algorithm of the first reference reaching this
        // point sizes the substitute key after a transport failure.
        let key_len = self.config.registry.key_len(algorithm)?;
        let key_bytes = KeyCell::resolve(&self.cell, key_len, &self.config);
        let secret = SymmetricSecret::new(key_bytes, algorithm);

        // Uniform FailedCheck whether the transport key or the content
        // key was bad.
        let plaintext = open(&secret, &data)?;

        let recovered: Vec<XmlEvent> = ciborium::de::from_reader(plaintext.as_slice())
            .map_err(|err| SecurityError::parse(format!("fragment decoding failed: {err}")))?;

        let reference_id = fragment.attribute("", "Id").unwrap_or_default().to_string();
        let record = if fragment.attribute("", "Type") == Some(names::TYPE_CONTENT) {
            SecurityEvent::ContentEncrypted { reference_id }
        } else {
            let name = recovered
                .iter()
                .find_map(|event| event.as_start().map(|start| start.name.clone()))
                .unwrap_or_else(|| names::encrypted_data());
            SecurityEvent::EncryptedPart { name, reference_id }
        };
        ctx.security_context_mut().record(record);

        // Substituted in place: the plaintext events pass through this
        // processor again (nested references), then down the chain.
        for event in recovered {
            self.handle_event(event, ctx)?;
        }
        Ok(())
    }
}

impl Processor for DecryptInputProcessor {
    fn name(&self) -> &'static str {
        "decrypt-input"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if self.collecting.is_some() {
            let complete =
                self.collecting.as_mut().is_some_and(|collector| collector.push(event));
            if complete {
                if let Some(collector) = self.collecting.take() {
                    self.process_encrypted(collector.events(), ctx)?;
                }
            }
            return Ok(());
        }

        if let XmlEvent::StartElement(start) = &event {
            if start.name.same_name(&names::encrypted_data()) {
                if let Some(id) = start.attribute_value("", "Id") {
                    if let Some(position) = self.pending.iter().position(|p| p == id) {
                        tracing::debug!(reference = %id, "found encrypted data reference");
                        self.pending.remove(position);
                        self.collecting = Some(ElementCollector::begin(start));
                        return Ok(());
                    }
                }
            }
        }
        ctx.forward(event)
    }

    fn finish(&mut self, _ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
        if let Some(id) = self.pending.first() {
            return Err(SecurityError::TokenNotFound { id: id.clone() });
        }
        Ok(())
    }
}
