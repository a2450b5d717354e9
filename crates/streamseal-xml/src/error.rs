//! Errors produced while canonicalizing an event stream.

use std::io;

use thiserror::Error;

/// Errors from the canonical serializer.
#[derive(Error, Debug)]
pub enum CanonicalError {
    /// The underlying sink failed.
    #[error("canonical output failed: {0}")]
    Io(#[from] io::Error),

    /// An end element arrived with no matching open element.
    #[error("unbalanced end element: {name}")]
    UnbalancedElement {
        /// Name of the offending end element.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: CanonicalError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, CanonicalError::Io(_)));
    }
}
