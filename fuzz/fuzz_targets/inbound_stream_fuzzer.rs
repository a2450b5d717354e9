//! Fuzz target for the inbound chain.
//!
//! Arbitrary well-formed-ish event streams (including mangled security
//! headers) must never panic the worker; every failure must surface as a
//! typed error through the relay.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use streamseal_core::{InboundProperties, InboundSecurity};
use streamseal_xml::{Attribute, QName, XmlEvent};

const NS_WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

#[derive(Debug, Arbitrary)]
enum FuzzEvent {
    Start { local: String, wsse: bool, attr: Option<(String, String)> },
    End { local: String, wsse: bool },
    Text(String),
}

fn to_event(fuzz: FuzzEvent) -> XmlEvent {
    let name = |local: String, wsse: bool| {
        if wsse {
            QName::new(NS_WSSE, local, "wsse")
        } else {
            QName::local(local)
        }
    };
    match fuzz {
        FuzzEvent::Start { local, wsse, attr } => {
            let attributes = attr
                .map(|(n, v)| vec![Attribute::new(QName::local(n), v)])
                .unwrap_or_default();
            XmlEvent::start_with(name(local, wsse), attributes, vec![])
        }
        FuzzEvent::End { local, wsse } => XmlEvent::end(name(local, wsse)),
        FuzzEvent::Text(text) => XmlEvent::text(text),
    }
}

fuzz_target!(|input: Vec<FuzzEvent>| {
    let events: Vec<XmlEvent> = input.into_iter().map(to_event).collect();

    let Ok(reader) = InboundSecurity::new(InboundProperties::new())
        .process(events.into_iter().map(Ok))
    else {
        return;
    };

    // Drain; errors are expected, panics are not.
    for item in reader {
        if item.is_err() {
            break;
        }
    }
});
