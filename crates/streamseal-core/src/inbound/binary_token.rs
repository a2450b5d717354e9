//! Inbound binary security token recognition.

use std::rc::Rc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use streamseal_crypto::VerifyingKey;
use streamseal_xml::XmlEvent;

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    fragment::{ElementCollector, Fragment},
    names,
    observe::SecurityEvent,
    token::{KeyIdentifier, SecurityToken, StaticTokenProvider},
};

/// Collects the bounded `wsse:BinarySecurityToken`, decodes the carried
/// key by value type and registers it under the element's id.
pub(crate) struct BinarySecurityTokenInputProcessor {
    collector: Option<ElementCollector>,
}

impl BinarySecurityTokenInputProcessor {
    pub(crate) fn new() -> Self {
        Self { collector: None }
    }

    fn register(&self, ctx: &mut ChainContext<'_>, events: &[XmlEvent]) -> Result<(), SecurityError> {
        let fragment = Fragment::parse(events)?;

        let value_type = fragment.require_attribute("", "ValueType")?;
        let encoding = names::encoding_for(value_type).ok_or_else(|| {
            SecurityError::invalid(format!("unknown binary token value type {value_type}"))
        })?;

        let bytes = STANDARD
            .decode(fragment.trimmed_text())
            .map_err(|_| SecurityError::invalid("malformed binary token value"))?;
        let key = VerifyingKey::import(encoding, &bytes)?;

        // A token without an id cannot be referenced; nothing to register.
        let Some(id) = fragment.attribute(names::NS_WSU, "Id") else {
            tracing::debug!("binary token without an id, skipping registration");
            return Ok(());
        };

        let token = SecurityToken::verification(id, key);
        let security_context = ctx.security_context_mut();
        security_context.register_token_provider(id, Rc::new(StaticTokenProvider::new(token)));
        security_context.record(SecurityEvent::TokenRecognized {
            id: id.to_string(),
            key_identifier: KeyIdentifier::BstDirectReference,
        });
        Ok(())
    }
}

impl Processor for BinarySecurityTokenInputProcessor {
    fn name(&self) -> &'static str {
        "binary-token-input"
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
            self.register(ctx, collector.events())?;
            ctx.remove_self();
        }
        Ok(())
    }
}
