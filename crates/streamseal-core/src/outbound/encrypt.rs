//! Outbound streaming encryption.
//!
//! The matcher follows the same discipline as the signature matcher: one
//! active worker at most, matched by name or id. The worker collects the
//! subtree's events, and at the matching end element replaces them with
//! an `xenc:EncryptedData` element whose cipher value is the sealed CBOR
//! encoding of the collected events. The ending processor emits the
//! `xenc:EncryptedKey` block (wrapped content key plus reference list)
//! into the security header at finish.

use std::{cell::Cell, rc::Rc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::{NONCE_SIZE, SymmetricSecret, seal};
use streamseal_xml::{Attribute, QName, StartElement, XmlEvent};

use crate::{
    chain::{ChainContext, Processor},
    config::{Coverage, SecurePart},
    error::SecurityError,
    names,
};

/// Context property holding the emitted data-reference ids, consumed once
/// by the ending processor.
const DATA_REFS_KEY: &str = "encrypt.data-refs";

/// Watches the stream for parts to encrypt.
pub(crate) struct EncryptOutputProcessor {
    parts: Vec<SecurePart>,
    secret: Rc<SymmetricSecret>,
    active: Rc<Cell<bool>>,
}

impl EncryptOutputProcessor {
    pub(crate) fn new(parts: Vec<SecurePart>, secret: Rc<SymmetricSecret>) -> Self {
        Self { parts, secret, active: Rc::new(Cell::new(false)) }
    }

    fn matched_part(&self, start: &StartElement) -> Option<Coverage> {
        self.parts.iter().find_map(|part| {
            if let Some(name) = &part.name {
                return start.name.same_name(name).then_some(part.coverage);
            }
            if let Some(id) = &part.id {
                return (start.attribute_value(names::NS_WSU, "Id") == Some(id.as_str()))
                    .then_some(part.coverage);
            }
            None
        })
    }
}

impl Processor for EncryptOutputProcessor {
    fn name(&self) -> &'static str {
        "encrypt-output"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if let XmlEvent::StartElement(start) = &event {
            if !self.active.get() {
                if let Some(coverage) = self.matched_part(start) {
                    let data_id = ctx.environment().generate_id("ed");
                    tracing::debug!(part = %start.name, data_id = %data_id, "matched secure part for encryption");
                    push_data_ref(ctx, data_id.clone());

                    let worker = InternalEncryptOutputProcessor {
                        subject: start.name.clone(),
                        coverage,
                        depth: 0,
                        collected: Vec::new(),
                        secret: Rc::clone(&self.secret),
                        data_id,
                        active: Rc::clone(&self.active),
                    };
                    self.active.set(true);
                    ctx.insert_after_self(Box::new(worker));
                    return ctx.redispatch(event);
                }
            }
        }
        ctx.forward(event)
    }
}

fn push_data_ref(ctx: &mut ChainContext<'_>, id: String) {
    let security_context = ctx.security_context_mut();
    if let Some(refs) = security_context.property_mut::<Vec<String>>(DATA_REFS_KEY) {
        refs.push(id);
    } else {
        security_context.set_property(DATA_REFS_KEY, vec![id]);
    }
}

/// Collects one subtree and replaces it with an encrypted-data element.
struct InternalEncryptOutputProcessor {
    subject: QName,
    coverage: Coverage,
    depth: usize,
    collected: Vec<XmlEvent>,
    secret: Rc<SymmetricSecret>,
    data_id: String,
    active: Rc<Cell<bool>>,
}

impl InternalEncryptOutputProcessor {
    fn emit_encrypted_data(&mut self, ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
        let mut plaintext = Vec::new();
        ciborium::ser::into_writer(&self.collected, &mut plaintext)
            .map_err(|err| SecurityError::parse(format!("fragment encoding failed: {err}")))?;

        let mut nonce = [0u8; NONCE_SIZE];
        ctx.environment().fill_random(&mut nonce);
        let cipher_value = STANDARD.encode(seal(&self.secret, nonce, &plaintext)?);

        let type_uri = match self.coverage {
            Coverage::Element => names::TYPE_ELEMENT,
            Coverage::Content => names::TYPE_CONTENT,
        };

        ctx.forward(XmlEvent::start_with(
            names::encrypted_data(),
            vec![
                Attribute::new(names::id_attr(), self.data_id.clone()),
                Attribute::new(names::type_attr(), type_uri),
            ],
            vec![names::bind_xenc()],
        ))?;
        ctx.forward(XmlEvent::start_with(
            names::encryption_method(),
            vec![Attribute::new(names::algorithm_attr(), self.secret.algorithm_uri())],
            vec![],
        ))?;
        ctx.forward(XmlEvent::end(names::encryption_method()))?;
        ctx.forward(XmlEvent::start(names::cipher_data()))?;
        ctx.forward(XmlEvent::start(names::cipher_value()))?;
        ctx.forward(XmlEvent::text(cipher_value))?;
        ctx.forward(XmlEvent::end(names::cipher_value()))?;
        ctx.forward(XmlEvent::end(names::cipher_data()))?;
        ctx.forward(XmlEvent::end(names::encrypted_data()))
    }
}

impl Processor for InternalEncryptOutputProcessor {
    fn name(&self) -> &'static str {
        "encrypt-worker"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        let opens_subject = self.depth == 0 && event.is_start();
        if event.is_start() {
            self.depth += 1;
        } else if event.is_end() {
            self.depth = self.depth.saturating_sub(1);
        }
        let closes_subject = self.depth == 0
            && event.as_end().is_some_and(|end| end.name.same_name(&self.subject));

        match self.coverage {
            Coverage::Element => {
                self.collected.push(event);
                if closes_subject {
                    self.emit_encrypted_data(ctx)?;
                    self.active.set(false);
                    ctx.remove_self();
                }
                Ok(())
            },
            Coverage::Content => {
                if opens_subject {
                    return ctx.forward(event);
                }
                if closes_subject {
                    self.emit_encrypted_data(ctx)?;
                    self.active.set(false);
                    ctx.remove_self();
                    return ctx.forward(event);
                }
                self.collected.push(event);
                Ok(())
            },
        }
    }
}

/// Emits the encrypted-key block at finish.
pub(crate) struct EncryptEndingOutputProcessor {
    wrapped_key: Vec<u8>,
    transport_uri: String,
    key_id: String,
    buffering: bool,
    buffer: Vec<XmlEvent>,
}

impl EncryptEndingOutputProcessor {
    pub(crate) fn new(wrapped_key: Vec<u8>, transport_uri: String, key_id: String) -> Self {
        Self { wrapped_key, transport_uri, key_id, buffering: false, buffer: Vec::new() }
    }

    fn emit_encrypted_key(
        &mut self,
        data_refs: &[String],
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        ctx.forward(XmlEvent::start_with(
            names::encrypted_key(),
            vec![Attribute::new(names::id_attr(), self.key_id.clone())],
            vec![names::bind_xenc()],
        ))?;
        ctx.forward(XmlEvent::start_with(
            names::encryption_method(),
            vec![Attribute::new(names::algorithm_attr(), self.transport_uri.clone())],
            vec![],
        ))?;
        ctx.forward(XmlEvent::end(names::encryption_method()))?;
        ctx.forward(XmlEvent::start(names::cipher_data()))?;
        ctx.forward(XmlEvent::start(names::cipher_value()))?;
        ctx.forward(XmlEvent::text(STANDARD.encode(&self.wrapped_key)))?;
        ctx.forward(XmlEvent::end(names::cipher_value()))?;
        ctx.forward(XmlEvent::end(names::cipher_data()))?;
        ctx.forward(XmlEvent::start(names::reference_list()))?;
        for data_ref in data_refs {
            ctx.forward(XmlEvent::start_with(
                names::data_reference(),
                vec![Attribute::new(names::uri_attr(), format!("#{data_ref}"))],
                vec![],
            ))?;
            ctx.forward(XmlEvent::end(names::data_reference()))?;
        }
        ctx.forward(XmlEvent::end(names::reference_list()))?;
        ctx.forward(XmlEvent::end(names::encrypted_key()))
    }
}

impl Processor for EncryptEndingOutputProcessor {
    fn name(&self) -> &'static str {
        "encrypt-ending"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if self.buffering {
            self.buffer.push(event);
            return Ok(());
        }
        if event.as_end().is_some_and(|end| end.name.same_name(&names::security())) {
            self.buffering = true;
            self.buffer.push(event);
            return Ok(());
        }
        ctx.forward(event)
    }

    fn finish(&mut self, ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
        let data_refs: Vec<String> =
            ctx.security_context_mut().take_property(DATA_REFS_KEY).unwrap_or_default();
        if !data_refs.is_empty() {
            self.emit_encrypted_key(&data_refs, ctx)?;
        }
        let buffered = std::mem::take(&mut self.buffer);
        for event in buffered {
            ctx.forward(event)?;
        }
        Ok(())
    }
}
