//! Inbound security-header recognition.
//!
//! Tracks the stream's position relative to the first `wsse:Security`
//! element. Each recognized direct child spawns the matching
//! sub-processor, inserted right after this processor and handed the
//! child's start event by explicit re-dispatch so it collects its element
//! from the opening tag. Unknown header children pass through untouched.

use std::rc::Rc;

use streamseal_xml::{StartElement, XmlEvent};

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    inbound::{
        InboundConfig, binary_token::BinarySecurityTokenInputProcessor,
        encrypted_key::EncryptedKeyInputProcessor, signature::SignatureInputProcessor,
        timestamp::TimestampInputProcessor,
    },
    names,
};

pub(crate) struct SecurityHeaderInputProcessor {
    config: Rc<InboundConfig>,
    /// True while inside the first security header.
    inside: bool,
    /// Whether the first security header has been engaged already.
    engaged: bool,
    /// Element depth relative to the security header start.
    depth: usize,
}

impl SecurityHeaderInputProcessor {
    pub(crate) fn new(config: Rc<InboundConfig>) -> Self {
        Self { config, inside: false, engaged: false, depth: 0 }
    }

    fn sub_processor_for(&self, start: &StartElement) -> Option<Box<dyn Processor>> {
        if start.name.same_name(&names::timestamp()) {
            return Some(Box::new(TimestampInputProcessor::new(Rc::clone(&self.config))));
        }
        if start.name.same_name(&names::binary_security_token()) {
            return Some(Box::new(BinarySecurityTokenInputProcessor::new()));
        }
        if start.name.same_name(&names::encrypted_key()) {
            return Some(Box::new(EncryptedKeyInputProcessor::new(Rc::clone(&self.config))));
        }
        if start.name.same_name(&names::signature()) {
            return Some(Box::new(SignatureInputProcessor::new(Rc::clone(&self.config))));
        }
        None
    }
}

impl Processor for SecurityHeaderInputProcessor {
    fn name(&self) -> &'static str {
        "security-header-input"
    }

    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError> {
        if !self.inside {
            if !self.engaged
                && event.as_start().is_some_and(|start| start.name.same_name(&names::security()))
            {
                self.inside = true;
                self.engaged = true;
                self.depth = 1;
            }
            return ctx.forward(event);
        }

        match &event {
            XmlEvent::StartElement(start) => {
                if self.depth == 1 {
                    if let Some(sub) = self.sub_processor_for(start) {
                        tracing::debug!(child = %start.name, "recognized security header child");
                        self.depth += 1;
                        ctx.insert_after_self(sub);
                        return ctx.redispatch(event);
                    }
                }
                self.depth += 1;
            },
            XmlEvent::EndElement(_) => {
                self.depth = self.depth.saturating_sub(1);
                if self.depth == 0 {
                    self.inside = false;
                }
            },
            _ => {},
        }
        ctx.forward(event)
    }
}
