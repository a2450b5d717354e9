//! Inbound signature verification.
//!
//! The header sub-processor collects the bounded `ds:Signature` element,
//! verifies the signature value over the byte-exact canonical form of
//! the signed-info events as received, and installs a reference verifier
//! ahead of the relay. The verifier digests each referenced subtree's
//! canonical form while forwarding it and compares against the recorded
//! digest value. References the stream never resolves are a failed check.

use std::rc::Rc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::{
    AlgorithmKind, DigestAccumulator, VerifyingKey, uris,
};
use streamseal_xml::{ExclusiveCanonicalizer, QName, XmlEvent};

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    fragment::{ElementCollector, Fragment, slice_element},
    inbound::InboundConfig,
    names,
    observe::SecurityEvent,
    token::{DelegatedToken, KeyIdentifier},
};

/// One reference from the signed-info block, awaiting its subtree.
struct ReferenceCheck {
    id: String,
    digest_uri: String,
    digest_value: Vec<u8>,
}

pub(crate) struct SignatureInputProcessor {
    config: Rc<InboundConfig>,
    collector: Option<ElementCollector>,
}

impl SignatureInputProcessor {
    pub(crate) fn new(config: Rc<InboundConfig>) -> Self {
        Self { config, collector: None }
    }

    fn verify(&self, ctx: &mut ChainContext<'_>, events: &[XmlEvent]) -> Result<(), SecurityError> {
        let fragment = Fragment::parse(events)?;
        let signed_info = fragment.require_child(names::NS_DS, "SignedInfo")?;

        let c14n_uri = signed_info
            .require_child(names::NS_DS, "CanonicalizationMethod")?
            .require_attribute("", "Algorithm")?;
        if c14n_uri != uris::EXCLUSIVE_C14N {
            return Err(SecurityError::UnsupportedAlgorithm { uri: c14n_uri.to_string() });
        }

        let signature_method = signed_info
            .require_child(names::NS_DS, "SignatureMethod")?
            .require_attribute("", "Algorithm")?;
        self.config.registry.require(signature_method, AlgorithmKind::Signature)?;

        let mut references = Vec::new();
        for reference in signed_info.children_named(names::NS_DS, "Reference") {
            let uri = reference.require_attribute("", "URI")?;
            let digest_uri = reference
                .require_child(names::NS_DS, "DigestMethod")?
                .require_attribute("", "Algorithm")?;
            self.config.registry.require(digest_uri, AlgorithmKind::Digest)?;
            let digest_value = STANDARD
                .decode(reference.require_child(names::NS_DS, "DigestValue")?.trimmed_text())
                .map_err(|_| SecurityError::invalid("malformed digest value"))?;
            references.push(ReferenceCheck {
                id: names::fragment_id(uri).to_string(),
                digest_uri: digest_uri.to_string(),
                digest_value,
            });
        }
        if references.is_empty() {
            return Err(SecurityError::invalid("signature covers no references"));
        }

        let signature_bytes = STANDARD
            .decode(fragment.require_child(names::NS_DS, "SignatureValue")?.trimmed_text())
            .map_err(|_| SecurityError::invalid("malformed signature value"))?;

        let verifying_key = self.resolve_key(ctx, &fragment)?;
        if verifying_key.algorithm_uri() != signature_method {
            return Err(SecurityError::invalid("signature method does not match the key"));
        }

        // Byte-exact: canonicalize the signed-info events exactly as they
        // arrived.
        let signed_info_events = slice_element(events, names::NS_DS, "SignedInfo")
            .ok_or_else(|| SecurityError::invalid("signature is missing its signed info"))?;
        let mut canonical = Vec::new();
        let mut canonicalizer = ExclusiveCanonicalizer::default_transform();
        for event in signed_info_events {
            canonicalizer.write_event(event, &mut canonical)?;
        }

        verifying_key.verify(&canonical, &signature_bytes)?;

        let security_context = ctx.security_context_mut();
        security_context.record(SecurityEvent::Operation { operation: "signature" });
        security_context.record(SecurityEvent::AlgorithmSuite {
            purpose: "signature",
            uri: signature_method.to_string(),
        });
        security_context
            .record(SecurityEvent::SignatureVerified { reference_count: references.len() });

        ctx.insert_before_terminal(Box::new(SignatureReferenceVerifyProcessor {
            pending: references,
            active: None,
        }));
        Ok(())
    }

    /// Resolve the verification key through the key info's token
    /// reference, falling back to the configured default key.
    fn resolve_key(
        &self,
        ctx: &ChainContext<'_>,
        signature: &Fragment,
    ) -> Result<VerifyingKey, SecurityError> {
        if let Some(key_info) = signature.child(names::NS_DS, "KeyInfo") {
            let token_reference = key_info
                .require_child(names::NS_WSSE, "SecurityTokenReference")?
                .require_child(names::NS_WSSE, "Reference")?;
            let uri = token_reference.require_attribute("", "URI")?;
            let token = ctx.security_context().resolve_token(names::fragment_id(uri))?;

            // The token keeps its own classification; this usage site
            // reinterprets it as a direct reference.
            let delegated = DelegatedToken::new(token, KeyIdentifier::BstDirectReference);
            return delegated
                .underlying()
                .verifying_key()
                .cloned()
                .ok_or_else(|| SecurityError::failed_check("token has no verification key"));
        }

        self.config
            .default_verification_key
            .clone()
            .ok_or_else(|| SecurityError::failed_check("no verification key available"))
    }
}

impl Processor for SignatureInputProcessor {
    fn name(&self) -> &'static str {
        "signature-input"
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
            self.verify(ctx, collector.events())?;
            ctx.remove_self();
        }
        Ok(())
    }
}

/// Digests referenced subtrees as they stream past the relay.
struct ActiveDigest {
    canonicalizer: ExclusiveCanonicalizer,
    digest: DigestAccumulator,
    reference: ReferenceCheck,
    subject: QName,
}

struct SignatureReferenceVerifyProcessor {
    pending: Vec<ReferenceCheck>,
    active: Option<ActiveDigest>,
}

impl Processor for SignatureReferenceVerifyProcessor {
    fn name(&self) -> &'static str {
        "signature-reference-verify"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if let Some(active) = self.active.as_mut() {
            active.canonicalizer.write_event(&event, &mut active.digest)?;
            let closed = event.is_end() && active.canonicalizer.depth() == 0;
            ctx.forward(event)?;

            if closed {
                let Some(active) = self.active.take() else {
                    return Ok(());
                };
                if active.digest.finalize() != active.reference.digest_value {
                    return Err(SecurityError::failed_check(format!(
                        "digest mismatch for signed reference {}",
                        active.reference.id
                    )));
                }
                tracing::debug!(reference = %active.reference.id, "signed reference verified");
                ctx.security_context_mut().record(SecurityEvent::SignedPart {
                    name: active.subject,
                    reference_id: active.reference.id,
                });
                if self.pending.is_empty() {
                    ctx.remove_self();
                }
            }
            return Ok(());
        }

        if let XmlEvent::StartElement(start) = &event {
            let id = start
                .attribute_value(names::NS_WSU, "Id")
                .or_else(|| start.attribute_value("", "Id"));
            if let Some(id) = id {
                if let Some(position) = self.pending.iter().position(|r| r.id == id) {
                    let reference = self.pending.remove(position);
                    let mut canonicalizer = ExclusiveCanonicalizer::default_transform();
                    let mut digest = DigestAccumulator::for_uri(&reference.digest_uri)?;
                    canonicalizer.write_event(&event, &mut digest)?;
                    self.active = Some(ActiveDigest {
                        canonicalizer,
                        digest,
                        reference,
                        subject: start.name.clone(),
                    });
                    return ctx.forward(event);
                }
            }
        }
        ctx.forward(event)
    }

    fn finish(&mut self, _ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
        if let Some(reference) = self.pending.first() {
            return Err(SecurityError::failed_check(format!(
                "signed reference {} never appeared in the stream",
                reference.id
            )));
        }
        if self.active.is_some() {
            return Err(SecurityError::failed_check(
                "signed reference subtree was not completed",
            ));
        }
        Ok(())
    }
}
