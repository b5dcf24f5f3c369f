//! Error types for snapshot encoding and decoding.

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while building or reading snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A required field was absent from the snapshot map.
    #[error("missing required field '{tag}'")]
    MissingField {
        /// The short tag of the missing field.
        tag: &'static str,
    },

    /// A field was present but held a value of the wrong shape.
    #[error("field '{tag}' has unexpected type (expected {expected})")]
    WrongType {
        /// The short tag of the offending field.
        tag: String,
        /// The expected value shape.
        expected: &'static str,
    },

    /// A field held a value outside its legal range (e.g. an unknown
    /// state code).
    #[error("field '{tag}' holds invalid value: {reason}")]
    InvalidValue {
        /// The short tag of the offending field.
        tag: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl SnapshotError {
    /// Creates a missing-field error for the given tag.
    pub fn missing(tag: &'static str) -> Self {
        Self::MissingField { tag }
    }

    /// Creates a wrong-type error for the given tag.
    pub fn wrong_type(tag: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongType {
            tag: tag.into(),
            expected,
        }
    }

    /// Creates an invalid-value error for the given tag.
    pub fn invalid(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SnapshotError::missing("v");
        assert_eq!(err.to_string(), "missing required field 'v'");

        let err = SnapshotError::wrong_type("ds", "long");
        assert!(err.to_string().contains("ds"));
        assert!(err.to_string().contains("long"));
    }
}
