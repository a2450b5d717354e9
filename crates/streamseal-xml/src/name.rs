//! Qualified element and attribute names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A qualified name: namespace URI, local name and the prefix it was
/// written with.
///
/// Equality and hashing include the prefix because canonical serialization
/// must reproduce the original prefix. Matching for security decisions
/// (which parts to protect, which header children to recognize) ignores the
/// prefix - use [`QName::matches`] for that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    /// Namespace URI. Empty for names in no namespace.
    pub namespace_uri: String,
    /// Local part of the name.
    pub local_name: String,
    /// Prefix the name was written with. Empty for the default namespace
    /// or no namespace.
    pub prefix: String,
}

impl QName {
    /// Create a name in a namespace with an explicit prefix.
    pub fn new(
        namespace_uri: impl Into<String>,
        local_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            local_name: local_name.into(),
            prefix: prefix.into(),
        }
    }

    /// Create a name with no namespace and no prefix.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self { namespace_uri: String::new(), local_name: local_name.into(), prefix: String::new() }
    }

    /// True if this name has the given namespace URI and local name,
    /// regardless of prefix.
    pub fn matches(&self, namespace_uri: &str, local_name: &str) -> bool {
        self.namespace_uri == namespace_uri && self.local_name == local_name
    }

    /// True if this name refers to the same expanded name as `other`
    /// (namespace URI + local name, prefix ignored).
    pub fn same_name(&self, other: &QName) -> bool {
        self.matches(&other.namespace_uri, &other.local_name)
    }

    /// The name as written: `prefix:local` or bare `local`.
    pub fn as_written(&self) -> String {
        if self.prefix.is_empty() {
            self.local_name.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_name)
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ignores_prefix() {
        let a = QName::new("urn:example", "Body", "ex");
        let b = QName::new("urn:example", "Body", "");

        assert!(a.matches("urn:example", "Body"));
        assert!(a.same_name(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn as_written_includes_prefix() {
        assert_eq!(QName::new("urn:x", "Body", "ex").as_written(), "ex:Body");
        assert_eq!(QName::local("Body").as_written(), "Body");
    }

    #[test]
    fn display_uses_expanded_form() {
        assert_eq!(QName::new("urn:x", "Body", "ex").to_string(), "{urn:x}Body");
        assert_eq!(QName::local("Body").to_string(), "Body");
    }
}
