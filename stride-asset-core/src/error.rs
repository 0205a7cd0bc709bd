//! Error types for Stride asset editing

use std::io;
use thiserror::Error;

/// Result type alias for Stride asset operations
pub type Result<T> = std::result::Result<T, StrideAssetError>;

/// Main error type for Stride asset editing operations
#[derive(Error, Debug)]
pub enum StrideAssetError {
    /// IO errors when reading/writing files
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A required identifier was empty or blank
    #[error("Missing argument: '{name}' must not be empty")]
    MissingArgument { name: String },

    /// A file, entity, component or asset could not be found
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// Strict-mode property validation failure
    #[error(
        "Property '{property}' on '{class_name}' rejected: expected {expected}, got {actual}. Example: {example}"
    )]
    Validation {
        property: String,
        class_name: String,
        expected: String,
        actual: String,
        example: String,
    },

    /// The document does not have the shape the editor expects
    #[error("Document structure error: {message}")]
    Structure { message: String },

    /// Text that could not be read at all
    #[error("Format error: {0}")]
    Format(String),

    /// Line-level parsing errors
    #[error("Parse error at line {line}: {message}")]
    Parse { message: String, line: usize },

    /// Invalid glob or name pattern
    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

impl StrideAssetError {
    /// Create a missing argument error
    pub fn missing_argument<S: Into<String>>(name: S) -> Self {
        Self::MissingArgument { name: name.into() }
    }

    /// Create a not found error
    pub fn not_found<K: Into<String>, N: Into<String>>(kind: K, name: N) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a structure error
    pub fn structure<S: Into<String>>(message: S) -> Self {
        Self::Structure {
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format<S: Into<String>>(message: S) -> Self {
        Self::Format(message.into())
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(message: S, line: usize) -> Self {
        Self::Parse {
            message: message.into(),
            line,
        }
    }

    /// Create a pattern error
    pub fn pattern<S: Into<String>>(message: S) -> Self {
        Self::Pattern(message.into())
    }

    /// True for the not-found family of failures
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Fail with [`StrideAssetError::MissingArgument`] when `value` is blank.
pub fn require<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(StrideAssetError::missing_argument(name))
    } else {
        Ok(value)
    }
}
