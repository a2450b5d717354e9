//! Streaming Exclusive XML Canonicalization 1.0 (comments omitted).
//!
//! One canonicalizer instance serializes exactly one subtree: feed it the
//! subtree's events in order and it writes canonical bytes incrementally,
//! holding only the namespace context stack - never the subtree itself.
//! This is what lets a digest be computed while the document streams past.
//!
//! # Invariants
//!
//! - Identical event sequences produce byte-identical output.
//! - A namespace binding is rendered on an element iff it is visibly
//!   utilized there (element prefix, attribute prefix, or listed in the
//!   inclusive-prefix list) and differs from what the nearest rendered
//!   ancestor declared for that prefix.
//! - Namespace declarations are written first, sorted by prefix; attributes
//!   follow, sorted by (namespace URI, local name).

use std::{
    collections::{BTreeMap, BTreeSet},
    io::Write,
};

use crate::{
    error::CanonicalError,
    event::{StartElement, XmlEvent},
    name::QName,
};

/// One open element's contribution to the namespace context.
#[derive(Debug)]
struct Level {
    name: QName,
    /// Bindings declared on this element (from the event), rendered or not.
    declared: Vec<(String, String)>,
    /// Bindings this element actually rendered into the output.
    rendered: Vec<(String, String)>,
}

/// Exclusive canonicalization writer for a single subtree.
#[derive(Debug)]
pub struct ExclusiveCanonicalizer {
    inclusive_prefixes: BTreeSet<String>,
    open: Vec<Level>,
}

impl ExclusiveCanonicalizer {
    /// Create a canonicalizer with an inclusive-prefix list.
    ///
    /// Prefixes on the list are treated as visibly utilized on every
    /// element, which forces their bindings into the output even when no
    /// name in the subtree uses them.
    pub fn new<I, S>(inclusive_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inclusive_prefixes: inclusive_prefixes.into_iter().map(Into::into).collect(),
            open: Vec::new(),
        }
    }

    /// Canonicalizer with an empty inclusive-prefix list.
    pub fn default_transform() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Serialize one event into `out`.
    ///
    /// Comments are dropped. Events arriving after the subtree's final end
    /// element are the caller's bookkeeping error; this writer only rejects
    /// an end element with no open element at all.
    pub fn write_event<W: Write>(
        &mut self,
        event: &XmlEvent,
        out: &mut W,
    ) -> Result<(), CanonicalError> {
        match event {
            XmlEvent::StartElement(start) => self.write_start(start, out),
            XmlEvent::EndElement(end) => {
                let Some(_level) = self.open.pop() else {
                    return Err(CanonicalError::UnbalancedElement { name: end.name.to_string() });
                };
                out.write_all(b"</")?;
                out.write_all(end.name.as_written().as_bytes())?;
                out.write_all(b">")?;
                Ok(())
            },
            XmlEvent::Characters(chars) => {
                write_escaped_text(chars.text.as_bytes(), out)?;
                Ok(())
            },
            XmlEvent::Comment(_) => Ok(()),
            XmlEvent::ProcessingInstruction { target, data } => {
                out.write_all(b"<?")?;
                out.write_all(target.as_bytes())?;
                if !data.is_empty() {
                    out.write_all(b" ")?;
                    out.write_all(data.as_bytes())?;
                }
                out.write_all(b"?>")?;
                Ok(())
            },
        }
    }

    fn write_start<W: Write>(
        &mut self,
        start: &StartElement,
        out: &mut W,
    ) -> Result<(), CanonicalError> {
        let declared: Vec<(String, String)> =
            start.namespaces.iter().map(|b| (b.prefix.clone(), b.uri.clone())).collect();

        // Visibly utilized prefixes and the URIs their names carry. Names
        // are authoritative: the binding value comes from the QName itself,
        // so the output is stable even when a producer omits redundant
        // declaration events.
        let mut utilized: BTreeMap<String, String> = BTreeMap::new();
        utilized.insert(start.name.prefix.clone(), start.name.namespace_uri.clone());
        for attribute in &start.attributes {
            if !attribute.name.prefix.is_empty() {
                utilized
                    .entry(attribute.name.prefix.clone())
                    .or_insert_with(|| attribute.name.namespace_uri.clone());
            }
        }
        for prefix in &self.inclusive_prefixes {
            if let Some(uri) = self.in_scope(prefix, &declared) {
                utilized.entry(prefix.clone()).or_insert(uri);
            }
        }

        let mut rendered: Vec<(String, String)> = Vec::new();
        for (prefix, uri) in &utilized {
            let ancestor = self.rendered_ancestor(prefix);
            if ancestor.as_deref() != Some(uri.as_str()) {
                // An absent ancestor binding and an empty URI mean the same
                // thing: nothing to undeclare.
                if ancestor.is_none() && uri.is_empty() {
                    continue;
                }
                rendered.push((prefix.clone(), uri.clone()));
            }
        }

        out.write_all(b"<")?;
        out.write_all(start.name.as_written().as_bytes())?;

        for (prefix, uri) in &rendered {
            if prefix.is_empty() {
                out.write_all(b" xmlns=\"")?;
            } else {
                out.write_all(b" xmlns:")?;
                out.write_all(prefix.as_bytes())?;
                out.write_all(b"=\"")?;
            }
            write_escaped_attribute(uri.as_bytes(), out)?;
            out.write_all(b"\"")?;
        }

        let mut attributes: Vec<_> = start.attributes.iter().collect();
        attributes
            .sort_by(|a, b| {
                (&a.name.namespace_uri, &a.name.local_name)
                    .cmp(&(&b.name.namespace_uri, &b.name.local_name))
            });
        for attribute in attributes {
            out.write_all(b" ")?;
            out.write_all(attribute.name.as_written().as_bytes())?;
            out.write_all(b"=\"")?;
            write_escaped_attribute(attribute.value.as_bytes(), out)?;
            out.write_all(b"\"")?;
        }

        out.write_all(b">")?;

        self.open.push(Level { name: start.name.clone(), declared, rendered });
        Ok(())
    }

    /// Nearest in-scope URI for `prefix`, considering the element currently
    /// being written (`pending`) before the open-element stack.
    fn in_scope(&self, prefix: &str, pending: &[(String, String)]) -> Option<String> {
        if let Some((_, uri)) = pending.iter().rev().find(|(p, _)| p == prefix) {
            return Some(uri.clone());
        }
        for level in self.open.iter().rev() {
            if let Some((_, uri)) = level.declared.iter().rev().find(|(p, _)| p == prefix) {
                return Some(uri.clone());
            }
        }
        None
    }

    /// URI the nearest output ancestor rendered for `prefix`, if any.
    fn rendered_ancestor(&self, prefix: &str) -> Option<String> {
        for level in self.open.iter().rev() {
            if let Some((_, uri)) = level.rendered.iter().rev().find(|(p, _)| p == prefix) {
                return Some(uri.clone());
            }
        }
        None
    }

    /// Name of the innermost open element, if any.
    pub fn current_element(&self) -> Option<&QName> {
        self.open.last().map(|level| &level.name)
    }
}

/// Character-data escaping per the canonicalization character maps.
fn write_escaped_text<W: Write>(text: &[u8], out: &mut W) -> Result<(), CanonicalError> {
    for &byte in text {
        match byte {
            b'&' => out.write_all(b"&amp;")?,
            b'<' => out.write_all(b"&lt;")?,
            b'>' => out.write_all(b"&gt;")?,
            b'\r' => out.write_all(b"&#xD;")?,
            _ => out.write_all(&[byte])?,
        }
    }
    Ok(())
}

/// Attribute-value escaping per the canonicalization character maps.
fn write_escaped_attribute<W: Write>(value: &[u8], out: &mut W) -> Result<(), CanonicalError> {
    for &byte in value {
        match byte {
            b'&' => out.write_all(b"&amp;")?,
            b'<' => out.write_all(b"&lt;")?,
            b'"' => out.write_all(b"&quot;")?,
            b'\t' => out.write_all(b"&#x9;")?,
            b'\n' => out.write_all(b"&#xA;")?,
            b'\r' => out.write_all(b"&#xD;")?,
            _ => out.write_all(&[byte])?,
        }
    }
    Ok(())
}
