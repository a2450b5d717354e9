//! Inbound timestamp validation.

use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use streamseal_xml::XmlEvent;

use crate::{
    chain::{ChainContext, Processor},
    error::SecurityError,
    fragment::{ElementCollector, Fragment},
    inbound::InboundConfig,
    names,
    observe::SecurityEvent,
};

/// Collects the bounded `wsu:Timestamp` element, validates its window
/// against the environment clock and removes itself.
pub(crate) struct TimestampInputProcessor {
    config: Rc<InboundConfig>,
    collector: Option<ElementCollector>,
}

impl TimestampInputProcessor {
    pub(crate) fn new(config: Rc<InboundConfig>) -> Self {
        Self { config, collector: None }
    }

    fn validate(&self, ctx: &mut ChainContext<'_>, events: &[XmlEvent]) -> Result<(), SecurityError> {
        let fragment = Fragment::parse(events)?;
        let created = parse_instant(
            fragment.require_child(names::NS_WSU, "Created")?.trimmed_text(),
        )?;
        let expires = parse_instant(
            fragment.require_child(names::NS_WSU, "Expires")?.trimmed_text(),
        )?;

        if expires <= created {
            return Err(SecurityError::invalid("timestamp expires before its creation"));
        }

        let now = ctx.environment().now();
        let skew = Duration::seconds(self.config.timestamp_skew_secs);
        if created > now + skew {
            return Err(SecurityError::invalid("timestamp created in the future"));
        }
        if now >= expires + skew {
            return Err(SecurityError::invalid("timestamp expired"));
        }

        let security_context = ctx.security_context_mut();
        security_context.record(SecurityEvent::Operation { operation: "timestamp" });
        security_context.record(SecurityEvent::TimestampValidated { created, expires });
        Ok(())
    }
}

fn parse_instant(text: &str) -> Result<DateTime<Utc>, SecurityError> {
    DateTime::parse_from_rfc3339(text)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| SecurityError::parse(format!("bad timestamp instant {text:?}: {err}")))
}

impl Processor for TimestampInputProcessor {
    fn name(&self) -> &'static str {
        "timestamp-input"
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
            self.validate(ctx, collector.events())?;
            ctx.remove_self();
        }
        Ok(())
    }
}
