//! Outbound streaming signature.
//!
//! Two cooperating processors plus a per-subtree worker:
//!
//! - [`SignatureOutputProcessor`] watches for securable parts. On a match
//!   it assigns a reference id (injecting one by event rewrite when the
//!   element has none), inserts an [`InternalSignatureOutputProcessor`]
//!   after itself and re-dispatches the rewritten start event so the
//!   worker digests the subtree from its opening tag.
//! - The worker pipes every subtree event through a canonicalizer into an
//!   incremental digest, counting nesting depth; at the matching end
//!   element it finalizes the digest into a part definition and removes
//!   itself. At most one worker is active at a time, so a part nested
//!   inside an already-active part is never matched twice.
//! - [`SignatureEndingOutputProcessor`] buffers the stream from the
//!   security header's end element on, and at finish assembles the
//!   signed-info block from all collected part definitions, signs its
//!   canonical form and emits the signature block inside the header.

use std::{cell::Cell, rc::Rc};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::{DigestAccumulator, SigningKey};
use streamseal_xml::{Attribute, ExclusiveCanonicalizer, QName, StartElement, XmlEvent};

use crate::{
    chain::{ChainContext, Processor},
    config::SecurePart,
    error::SecurityError,
    names,
    outbound::BinaryTokenEmit,
};

/// Context property holding the collected part definitions, consumed once
/// by the ending processor.
const PART_DEFS_KEY: &str = "signature.part-defs";

/// One protected subtree: reference id, transform choice and digest.
#[derive(Debug, Clone)]
pub(crate) struct SignaturePartDef {
    reference_id: String,
    transform_uri: String,
    digest_uri: String,
    digest_value: String,
}

/// Watches the stream for securable parts.
pub(crate) struct SignatureOutputProcessor {
    parts: Vec<SecurePart>,
    digest_uri: String,
    c14n_uri: String,
    /// Shared with the active worker; true while a subtree is being
    /// digested.
    active: Rc<Cell<bool>>,
}

impl SignatureOutputProcessor {
    pub(crate) fn new(parts: Vec<SecurePart>, digest_uri: String, c14n_uri: String) -> Self {
        Self { parts, digest_uri, c14n_uri, active: Rc::new(Cell::new(false)) }
    }

    fn matched_part(&self, start: &StartElement) -> bool {
        self.parts.iter().any(|part| {
            if let Some(name) = &part.name {
                return start.name.same_name(name);
            }
            if let Some(id) = &part.id {
                return start.attribute_value(names::NS_WSU, "Id") == Some(id.as_str());
            }
            false
        })
    }
}

impl Processor for SignatureOutputProcessor {
    fn name(&self) -> &'static str {
        "signature-output"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if let XmlEvent::StartElement(start) = &event {
            // One active worker at most: a part nested inside an already
            // matched part must not be digested twice.
            if !self.active.get() && self.matched_part(start) {
                let (reference_id, rewritten) =
                    match start.attribute_value(names::NS_WSU, "Id") {
                        Some(existing) => (existing.to_string(), start.clone()),
                        None => {
                            let id = ctx.environment().generate_id("id");
                            let rewritten = start
                                .with_namespace(names::bind_wsu())
                                .with_attribute(Attribute::new(names::wsu_id(), id.clone()));
                            (id, rewritten)
                        },
                    };
                tracing::debug!(part = %start.name, reference_id = %reference_id, "matched secure part for signature");

                let worker = InternalSignatureOutputProcessor {
                    subject: start.name.clone(),
                    canonicalizer: ExclusiveCanonicalizer::default_transform(),
                    digest: Some(DigestAccumulator::for_uri(&self.digest_uri)?),
                    part: Some(SignaturePartDef {
                        reference_id,
                        transform_uri: self.c14n_uri.clone(),
                        digest_uri: self.digest_uri.clone(),
                        digest_value: String::new(),
                    }),
                    active: Rc::clone(&self.active),
                };
                self.active.set(true);
                ctx.insert_after_self(Box::new(worker));
                return ctx.redispatch(XmlEvent::StartElement(rewritten));
            }
        }
        ctx.forward(event)
    }
}

/// Digests one subtree's canonical form while it streams.
struct InternalSignatureOutputProcessor {
    subject: QName,
    canonicalizer: ExclusiveCanonicalizer,
    digest: Option<DigestAccumulator>,
    part: Option<SignaturePartDef>,
    active: Rc<Cell<bool>>,
}

impl Processor for InternalSignatureOutputProcessor {
    fn name(&self) -> &'static str {
        "signature-digest"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if let Some(digest) = self.digest.as_mut() {
            self.canonicalizer.write_event(&event, digest)?;
        }

        let subtree_closed = event
            .as_end()
            .is_some_and(|end| end.name.same_name(&self.subject) && self.canonicalizer.depth() == 0);
        if subtree_closed {
            if let (Some(digest), Some(mut part)) = (self.digest.take(), self.part.take()) {
                part.digest_value = STANDARD.encode(digest.finalize());
                tracing::debug!(digest = %part.digest_value, "calculated digest");
                push_part_def(ctx, part);
            }
            // Signature matching is possible again from here on.
            self.active.set(false);
            ctx.remove_self();
        }
        ctx.forward(event)
    }
}

fn push_part_def(ctx: &mut ChainContext<'_>, def: SignaturePartDef) {
    let security_context = ctx.security_context_mut();
    if let Some(defs) = security_context.property_mut::<Vec<SignaturePartDef>>(PART_DEFS_KEY) {
        defs.push(def);
    } else {
        security_context.set_property(PART_DEFS_KEY, vec![def]);
    }
}

/// Assembles and emits the signature block at finish.
pub(crate) struct SignatureEndingOutputProcessor {
    signing_key: SigningKey,
    c14n_uri: String,
    binary_token: Option<BinaryTokenEmit>,
    buffering: bool,
    buffer: Vec<XmlEvent>,
}

impl SignatureEndingOutputProcessor {
    pub(crate) fn new(
        signing_key: SigningKey,
        c14n_uri: String,
        binary_token: Option<BinaryTokenEmit>,
    ) -> Self {
        Self { signing_key, c14n_uri, binary_token, buffering: false, buffer: Vec::new() }
    }

    fn signed_info_events(&self, defs: &[SignaturePartDef]) -> Vec<XmlEvent> {
        let mut events = vec![XmlEvent::start(names::signed_info())];

        events.push(XmlEvent::start_with(
            names::canonicalization_method(),
            vec![Attribute::new(names::algorithm_attr(), self.c14n_uri.clone())],
            vec![],
        ));
        events.push(XmlEvent::end(names::canonicalization_method()));

        events.push(XmlEvent::start_with(
            names::signature_method(),
            vec![Attribute::new(names::algorithm_attr(), self.signing_key.algorithm_uri())],
            vec![],
        ));
        events.push(XmlEvent::end(names::signature_method()));

        for def in defs {
            events.push(XmlEvent::start_with(
                names::ds_reference(),
                vec![Attribute::new(names::uri_attr(), format!("#{}", def.reference_id))],
                vec![],
            ));
            events.push(XmlEvent::start(names::transforms()));
            events.push(XmlEvent::start_with(
                names::transform(),
                vec![Attribute::new(names::algorithm_attr(), def.transform_uri.clone())],
                vec![],
            ));
            events.push(XmlEvent::end(names::transform()));
            events.push(XmlEvent::end(names::transforms()));
            events.push(XmlEvent::start_with(
                names::digest_method(),
                vec![Attribute::new(names::algorithm_attr(), def.digest_uri.clone())],
                vec![],
            ));
            events.push(XmlEvent::end(names::digest_method()));
            events.push(XmlEvent::start(names::digest_value()));
            events.push(XmlEvent::text(def.digest_value.clone()));
            events.push(XmlEvent::end(names::digest_value()));
            events.push(XmlEvent::end(names::ds_reference()));
        }

        events.push(XmlEvent::end(names::signed_info()));
        events
    }

    fn emit_signature(
        &mut self,
        defs: &[SignaturePartDef],
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        let signed_info = self.signed_info_events(defs);

        let mut canonical = Vec::new();
        let mut canonicalizer = ExclusiveCanonicalizer::default_transform();
        for event in &signed_info {
            canonicalizer.write_event(event, &mut canonical)?;
        }
        let signature_value = STANDARD.encode(self.signing_key.sign(&canonical)?);

        ctx.forward(XmlEvent::start_with(names::signature(), vec![], vec![names::bind_ds()]))?;
        for event in signed_info {
            ctx.forward(event)?;
        }
        ctx.forward(XmlEvent::start(names::signature_value()))?;
        ctx.forward(XmlEvent::text(signature_value))?;
        ctx.forward(XmlEvent::end(names::signature_value()))?;

        if let Some(token) = &self.binary_token {
            ctx.forward(XmlEvent::start(names::key_info()))?;
            ctx.forward(XmlEvent::start(names::security_token_reference()))?;
            ctx.forward(XmlEvent::start_with(
                names::token_reference(),
                vec![
                    Attribute::new(names::uri_attr(), format!("#{}", token.id)),
                    Attribute::new(names::value_type_attr(), token.value_type.clone()),
                ],
                vec![],
            ))?;
            ctx.forward(XmlEvent::end(names::token_reference()))?;
            ctx.forward(XmlEvent::end(names::security_token_reference()))?;
            ctx.forward(XmlEvent::end(names::key_info()))?;
        }

        ctx.forward(XmlEvent::end(names::signature()))
    }
}

impl Processor for SignatureEndingOutputProcessor {
    fn name(&self) -> &'static str {
        "signature-ending"
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
        let defs: Vec<SignaturePartDef> =
            ctx.security_context_mut().take_property(PART_DEFS_KEY).unwrap_or_default();
        if !defs.is_empty() {
            self.emit_signature(&defs, ctx)?;
        }
        let buffered = std::mem::take(&mut self.buffer);
        for event in buffered {
            ctx.forward(event)?;
        }
        Ok(())
    }
}
