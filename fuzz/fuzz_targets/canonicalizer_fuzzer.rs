//! Fuzz target for the exclusive canonicalizer.
//!
//! Arbitrary (possibly unbalanced) event sequences must never panic the
//! writer, and identical input must always produce identical output.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use streamseal_xml::{Attribute, ExclusiveCanonicalizer, NamespaceBinding, QName, XmlEvent};

#[derive(Debug, Arbitrary)]
enum FuzzEvent {
    Start { prefix: String, local: String, uri: String, attr: Option<(String, String)> },
    End { prefix: String, local: String, uri: String },
    Text(String),
    Comment(String),
}

fn to_event(fuzz: FuzzEvent) -> XmlEvent {
    match fuzz {
        FuzzEvent::Start { prefix, local, uri, attr } => {
            let namespaces = vec![NamespaceBinding::new(prefix.clone(), uri.clone())];
            let attributes = attr
                .map(|(name, value)| vec![Attribute::new(QName::local(name), value)])
                .unwrap_or_default();
            XmlEvent::start_with(QName::new(uri, local, prefix), attributes, namespaces)
        }
        FuzzEvent::End { prefix, local, uri } => XmlEvent::end(QName::new(uri, local, prefix)),
        FuzzEvent::Text(text) => XmlEvent::text(text),
        FuzzEvent::Comment(text) => XmlEvent::Comment(text),
    }
}

fuzz_target!(|input: Vec<FuzzEvent>| {
    let events: Vec<XmlEvent> = input.into_iter().map(to_event).collect();

    let mut first = Vec::new();
    let mut c14n = ExclusiveCanonicalizer::default_transform();
    for event in &events {
        if c14n.write_event(event, &mut first).is_err() {
            return;
        }
    }

    let mut second = Vec::new();
    let mut c14n = ExclusiveCanonicalizer::default_transform();
    for event in &events {
        let _ = c14n.write_event(event, &mut second);
    }
    assert_eq!(first, second);
});
