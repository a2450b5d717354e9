//! The structural event union.
//!
//! Events are immutable once produced: a processor that needs to change an
//! event (for example to inject an id attribute on a matched element)
//! builds a replacement carrying the same stream position and forwards
//! that instead.

use serde::{Deserialize, Serialize};

use crate::name::QName;

/// A single attribute as written on a start element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name. Unprefixed attributes have an empty namespace URI.
    pub name: QName,
    /// Attribute value, already entity-decoded.
    pub value: String,
}

impl Attribute {
    /// Create an attribute.
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self { name, value: value.into() }
    }
}

/// A namespace declaration carried on a start element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceBinding {
    /// Declared prefix. Empty for the default namespace declaration.
    pub prefix: String,
    /// Bound namespace URI. Empty to undeclare the default namespace.
    pub uri: String,
}

impl NamespaceBinding {
    /// Create a namespace binding.
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), uri: uri.into() }
    }
}

/// Opening tag of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartElement {
    /// Element name.
    pub name: QName,
    /// Attributes in document order.
    pub attributes: Vec<Attribute>,
    /// Namespace declarations in document order.
    pub namespaces: Vec<NamespaceBinding>,
}

impl StartElement {
    /// Value of the attribute with the given expanded name, if present.
    pub fn attribute_value(&self, namespace_uri: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.matches(namespace_uri, local_name))
            .map(|a| a.value.as_str())
    }

    /// A copy of this start element with one more attribute appended.
    ///
    /// Used for event rewriting: the original event stays untouched, the
    /// rewritten copy takes its place in the stream.
    #[must_use]
    pub fn with_attribute(&self, attribute: Attribute) -> Self {
        let mut rewritten = self.clone();
        rewritten.attributes.push(attribute);
        rewritten
    }

    /// A copy of this start element with one more namespace declaration
    /// appended, unless an identical binding is already declared.
    #[must_use]
    pub fn with_namespace(&self, binding: NamespaceBinding) -> Self {
        if self.namespaces.iter().any(|b| b.prefix == binding.prefix && b.uri == binding.uri) {
            return self.clone();
        }
        let mut rewritten = self.clone();
        rewritten.namespaces.push(binding);
        rewritten
    }
}

/// Closing tag of an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndElement {
    /// Element name, matching the corresponding start element.
    pub name: QName,
}

/// Character data between tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characters {
    /// Text content, already entity-decoded.
    pub text: String,
}

/// One structural event in the document stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlEvent {
    /// Opening tag.
    StartElement(StartElement),
    /// Closing tag.
    EndElement(EndElement),
    /// Character data.
    Characters(Characters),
    /// Comment. Ignored by canonical serialization.
    Comment(String),
    /// Processing instruction.
    ProcessingInstruction {
        /// Instruction target.
        target: String,
        /// Instruction data, possibly empty.
        data: String,
    },
}

impl XmlEvent {
    /// Start element with no attributes or namespace declarations.
    pub fn start(name: QName) -> Self {
        Self::StartElement(StartElement { name, attributes: Vec::new(), namespaces: Vec::new() })
    }

    /// Start element with attributes and namespace declarations.
    pub fn start_with(
        name: QName,
        attributes: Vec<Attribute>,
        namespaces: Vec<NamespaceBinding>,
    ) -> Self {
        Self::StartElement(StartElement { name, attributes, namespaces })
    }

    /// End element.
    pub fn end(name: QName) -> Self {
        Self::EndElement(EndElement { name })
    }

    /// Character data.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Characters(Characters { text: text.into() })
    }

    /// The start element, if this event is one.
    pub fn as_start(&self) -> Option<&StartElement> {
        match self {
            Self::StartElement(start) => Some(start),
            _ => None,
        }
    }

    /// The end element, if this event is one.
    pub fn as_end(&self) -> Option<&EndElement> {
        match self {
            Self::EndElement(end) => Some(end),
            _ => None,
        }
    }

    /// The character data, if this event is text.
    pub fn as_characters(&self) -> Option<&str> {
        match self {
            Self::Characters(chars) => Some(&chars.text),
            _ => None,
        }
    }

    /// True for [`XmlEvent::StartElement`].
    pub fn is_start(&self) -> bool {
        matches!(self, Self::StartElement(_))
    }

    /// True for [`XmlEvent::EndElement`].
    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndElement(_))
    }
}
