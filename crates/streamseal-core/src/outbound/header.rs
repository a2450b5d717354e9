//! Outbound security-header emission.
//!
//! After the document root's start event, emits the complete
//! `wsse:Security` element: timestamp and binary token inline, the end
//! element immediately after. Signature and encrypted-key blocks are
//! appended inside the header later by the ending processors, which
//! intercept the header's end element downstream.

use chrono::{Duration, SecondsFormat};
use streamseal_xml::{Attribute, XmlEvent};

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    names,
};

/// A binary token ready for emission.
#[derive(Debug, Clone)]
pub(crate) struct BinaryTokenEmit {
    /// Generated `bst-` id.
    pub(crate) id: String,
    /// Value type URI describing the key encoding.
    pub(crate) value_type: String,
    /// Base64 key bytes.
    pub(crate) encoded: String,
}

/// Emits the security header after the document root opens.
pub(crate) struct SecurityHeaderOutputProcessor {
    timestamp: bool,
    ttl_secs: i64,
    binary_token: Option<BinaryTokenEmit>,
    emitted: bool,
}

impl SecurityHeaderOutputProcessor {
    pub(crate) fn new(
        timestamp: bool,
        ttl_secs: i64,
        binary_token: Option<BinaryTokenEmit>,
    ) -> Self {
        Self { timestamp, ttl_secs, binary_token, emitted: false }
    }

    fn emit_header(&mut self, ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
        ctx.forward(XmlEvent::start_with(
            names::security(),
            vec![],
            vec![names::bind_wsse(), names::bind_wsu()],
        ))?;

        if self.timestamp {
            let created = ctx.environment().now();
            let expires = created + Duration::seconds(self.ttl_secs);

            ctx.forward(XmlEvent::start(names::timestamp()))?;
            ctx.forward(XmlEvent::start(names::created()))?;
            ctx.forward(XmlEvent::text(created.to_rfc3339_opts(SecondsFormat::Millis, true)))?;
            ctx.forward(XmlEvent::end(names::created()))?;
            ctx.forward(XmlEvent::start(names::expires()))?;
            ctx.forward(XmlEvent::text(expires.to_rfc3339_opts(SecondsFormat::Millis, true)))?;
            ctx.forward(XmlEvent::end(names::expires()))?;
            ctx.forward(XmlEvent::end(names::timestamp()))?;
        }

        if let Some(token) = self.binary_token.take() {
            ctx.forward(XmlEvent::start_with(
                names::binary_security_token(),
                vec![
                    Attribute::new(names::wsu_id(), token.id),
                    Attribute::new(names::value_type_attr(), token.value_type),
                    Attribute::new(names::encoding_type_attr(), names::ENCODING_BASE64),
                ],
                vec![],
            ))?;
            ctx.forward(XmlEvent::text(token.encoded))?;
            ctx.forward(XmlEvent::end(names::binary_security_token()))?;
        }

        ctx.forward(XmlEvent::end(names::security()))
    }
}

impl Processor for SecurityHeaderOutputProcessor {
    fn name(&self) -> &'static str {
        "security-header-output"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        let open_header = !self.emitted && event.is_start();
        ctx.forward(event)?;
        if open_header {
            self.emitted = true;
            self.emit_header(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use streamseal_xml::QName;

    use super::*;
    use crate::{
        chain::ProcessorChain,
        context::SecurityContext,
        env::SystemEnvironment,
        outbound::EventSink,
    };

    struct Collect(std::rc::Rc<std::cell::RefCell<Vec<XmlEvent>>>);

    impl Processor for Collect {
        fn name(&self) -> &'static str {
            "collect"
        }

        fn handle_event(
            &mut self,
            event: XmlEvent,
            _ctx: &mut ChainContext<'_>,
        ) -> Result<(), SecurityError> {
            self.0.borrow_mut().push(event);
            Ok(())
        }
    }

    #[test]
    fn header_follows_the_root_start_event() {
        let out = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut chain = ProcessorChain::new(SecurityContext::new(), Arc::new(SystemEnvironment));
        chain.append(Box::new(SecurityHeaderOutputProcessor::new(true, 300, None)));
        chain.append(Box::new(Collect(std::rc::Rc::clone(&out))));

        let root = QName::new("urn:envelope", "Envelope", "env");
        chain.process_event(XmlEvent::start(root.clone())).unwrap();
        chain.process_event(XmlEvent::end(root)).unwrap();

        let events = out.borrow();
        // Root start, then the whole header, then root end.
        assert!(events[0].as_start().is_some_and(|s| s.name.local_name == "Envelope"));
        assert!(events[1].as_start().is_some_and(|s| s.name.same_name(&names::security())));
        assert!(events[2].as_start().is_some_and(|s| s.name.same_name(&names::timestamp())));
        let last = events.len() - 1;
        assert!(events[last].as_end().is_some_and(|e| e.name.local_name == "Envelope"));
        assert!(events[last - 1].as_end().is_some_and(|e| e.name.same_name(&names::security())));
    }

    #[test]
    fn binary_token_carries_id_and_value_type() {
        let out = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut chain = ProcessorChain::new(SecurityContext::new(), Arc::new(SystemEnvironment));
        chain.append(Box::new(SecurityHeaderOutputProcessor::new(
            false,
            300,
            Some(BinaryTokenEmit {
                id: "bst-1".to_string(),
                value_type: names::VALUE_TYPE_ED25519.to_string(),
                encoded: "QUJD".to_string(),
            }),
        )));
        chain.append(Box::new(Collect(std::rc::Rc::clone(&out))));

        chain.process_event(XmlEvent::start(QName::local("Doc"))).unwrap();

        let events = out.borrow();
        let bst = events
            .iter()
            .find_map(|e| e.as_start().filter(|s| s.name.same_name(&names::binary_security_token())))
            .unwrap();
        assert_eq!(bst.attribute_value(names::NS_WSU, "Id"), Some("bst-1"));
        assert_eq!(bst.attribute_value("", "ValueType"), Some(names::VALUE_TYPE_ED25519));
    }

    #[test]
    fn sink_trait_collects_into_vec() {
        let mut sink: Vec<XmlEvent> = Vec::new();
        sink.accept(XmlEvent::text("x")).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
