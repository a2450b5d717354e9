//! Bounded-element buffering and structural access.
//!
//! Inbound processors that need to understand a small, bounded header
//! element (a timestamp, a binary token, an encrypted key, a signature)
//! collect its events with [`ElementCollector`] and then read them
//! through [`Fragment`], a tree view over the collected event list. The
//! raw event list stays available for byte-exact re-canonicalization.

use streamseal_xml::{QName, StartElement, XmlEvent};

use crate::error::SecurityError;

/// Collects the events of one element subtree, tracking nesting depth.
///
/// States: collecting until the matching end element (depth zero), then
/// complete.
#[derive(Debug)]
pub(crate) struct ElementCollector {
    events: Vec<XmlEvent>,
    depth: usize,
    complete: bool,
}

impl ElementCollector {
    /// Start collecting at an element's start event.
    pub(crate) fn begin(start: &StartElement) -> Self {
        Self { events: vec![XmlEvent::StartElement(start.clone())], depth: 1, complete: false }
    }

    /// Add the next event. Returns `true` once the subtree is complete.
    pub(crate) fn push(&mut self, event: XmlEvent) -> bool {
        debug_assert!(!self.complete);
        if event.is_start() {
            self.depth += 1;
        } else if event.is_end() {
            self.depth = self.depth.saturating_sub(1);
        }
        self.events.push(event);
        if self.depth == 0 {
            self.complete = true;
        }
        self.complete
    }

    /// The collected events.
    pub(crate) fn events(&self) -> &[XmlEvent] {
        &self.events
    }
}

/// Tree view over a collected event list.
#[derive(Debug)]
pub(crate) struct Fragment {
    pub(crate) name: QName,
    pub(crate) attributes: Vec<(QName, String)>,
    pub(crate) children: Vec<Fragment>,
    pub(crate) text: String,
}

impl Fragment {
    /// Parse a complete element event list into a tree.
    pub(crate) fn parse(events: &[XmlEvent]) -> Result<Self, SecurityError> {
        let mut iter = events.iter();
        let root = match iter.next() {
            Some(XmlEvent::StartElement(start)) => Self::parse_element(start, &mut iter)?,
            _ => return Err(SecurityError::parse("fragment does not begin with an element")),
        };
        Ok(root)
    }

    fn parse_element<'a>(
        start: &StartElement,
        iter: &mut impl Iterator<Item = &'a XmlEvent>,
    ) -> Result<Self, SecurityError> {
        let mut fragment = Self {
            name: start.name.clone(),
            attributes: start
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            children: Vec::new(),
            text: String::new(),
        };

        loop {
            match iter.next() {
                Some(XmlEvent::StartElement(child)) => {
                    fragment.children.push(Self::parse_element(child, iter)?);
                },
                Some(XmlEvent::EndElement(_)) => return Ok(fragment),
                Some(XmlEvent::Characters(chars)) => fragment.text.push_str(&chars.text),
                Some(XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction { .. }) => {},
                None => {
                    return Err(SecurityError::parse(format!(
                        "element {} is not closed",
                        fragment.name
                    )));
                },
            }
        }
    }

    /// First child with the given expanded name.
    pub(crate) fn child(&self, namespace_uri: &str, local_name: &str) -> Option<&Fragment> {
        self.children.iter().find(|c| c.name.matches(namespace_uri, local_name))
    }

    /// Child with the given expanded name, or an invalid-security error.
    pub(crate) fn require_child(
        &self,
        namespace_uri: &str,
        local_name: &str,
    ) -> Result<&Fragment, SecurityError> {
        self.child(namespace_uri, local_name).ok_or_else(|| {
            SecurityError::invalid(format!("{} is missing a {local_name} child", self.name))
        })
    }

    /// All children with the given expanded name.
    pub(crate) fn children_named<'a>(
        &'a self,
        namespace_uri: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = &'a Fragment> {
        self.children.iter().filter(move |c| c.name.matches(namespace_uri, local_name))
    }

    /// Attribute value by expanded name.
    pub(crate) fn attribute(&self, namespace_uri: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.matches(namespace_uri, local_name))
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value by expanded name, or an invalid-security error.
    pub(crate) fn require_attribute(
        &self,
        namespace_uri: &str,
        local_name: &str,
    ) -> Result<&str, SecurityError> {
        self.attribute(namespace_uri, local_name).ok_or_else(|| {
            SecurityError::invalid(format!("{} is missing a {local_name} attribute", self.name))
        })
    }

    /// The accumulated text content, whitespace-trimmed.
    pub(crate) fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// The event subrange of the first child element with the given expanded
/// name, including its start and end events.
pub(crate) fn slice_element<'a>(
    events: &'a [XmlEvent],
    namespace_uri: &str,
    local_name: &str,
) -> Option<&'a [XmlEvent]> {
    let from = events.iter().position(|event| {
        event.as_start().is_some_and(|start| start.name.matches(namespace_uri, local_name))
    })?;

    let mut depth = 0usize;
    for (offset, event) in events[from..].iter().enumerate() {
        if event.is_start() {
            depth += 1;
        } else if event.is_end() {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(&events[from..=from + offset]);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use streamseal_xml::Attribute;

    use super::*;

    fn sample() -> Vec<XmlEvent> {
        vec![
            XmlEvent::start_with(
                QName::new("urn:enc", "EncryptedKey", "xenc"),
                vec![Attribute::new(QName::local("Id"), "ek-1")],
                vec![],
            ),
            XmlEvent::start_with(
                QName::new("urn:enc", "EncryptionMethod", "xenc"),
                vec![Attribute::new(QName::local("Algorithm"), "urn:alg")],
                vec![],
            ),
            XmlEvent::end(QName::new("urn:enc", "EncryptionMethod", "xenc")),
            XmlEvent::start(QName::new("urn:enc", "CipherData", "xenc")),
            XmlEvent::start(QName::new("urn:enc", "CipherValue", "xenc")),
            XmlEvent::text("  QUJD  "),
            XmlEvent::end(QName::new("urn:enc", "CipherValue", "xenc")),
            XmlEvent::end(QName::new("urn:enc", "CipherData", "xenc")),
            XmlEvent::end(QName::new("urn:enc", "EncryptedKey", "xenc")),
        ]
    }

    #[test]
    fn collector_completes_at_matching_end() {
        let events = sample();
        let Some(start) = events[0].as_start() else { panic!("expected start") };

        let mut collector = ElementCollector::begin(start);
        let mut complete = false;
        for event in &events[1..] {
            complete = collector.push(event.clone());
            if complete {
                break;
            }
        }

        assert!(complete);
        assert_eq!(collector.events().len(), events.len());
    }

    #[test]
    fn fragment_navigation() {
        let fragment = Fragment::parse(&sample()).unwrap();

        assert_eq!(fragment.attribute("", "Id"), Some("ek-1"));
        let method = fragment.require_child("urn:enc", "EncryptionMethod").unwrap();
        assert_eq!(method.require_attribute("", "Algorithm").unwrap(), "urn:alg");

        let value = fragment
            .require_child("urn:enc", "CipherData")
            .unwrap()
            .require_child("urn:enc", "CipherValue")
            .unwrap();
        assert_eq!(value.trimmed_text(), "QUJD");
    }

    #[test]
    fn missing_structure_is_invalid_security() {
        let fragment = Fragment::parse(&sample()).unwrap();

        let missing = fragment.require_child("urn:enc", "ReferenceList");
        assert!(matches!(missing, Err(SecurityError::InvalidSecurity { .. })));
    }

    #[test]
    fn unclosed_fragment_is_a_parse_error() {
        let mut events = sample();
        events.pop();

        assert!(matches!(Fragment::parse(&events), Err(SecurityError::Parse { .. })));
    }

    #[test]
    fn slice_element_returns_the_exact_subrange() {
        let events = sample();

        let sliced = slice_element(&events, "urn:enc", "CipherData").unwrap();
        assert_eq!(sliced.len(), 5);
        assert!(sliced[0].as_start().is_some());
        assert!(sliced[4].as_end().is_some());

        assert!(slice_element(&events, "urn:enc", "Nope").is_none());
    }
}
