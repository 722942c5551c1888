use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::lookup::LookupError;

/// Why a parameter source could not produce values.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The `source_spec` payload is not what the source kind expects.
    #[error("Malformed source spec: {0}")]
    Parse(String),

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    /// Well-formed payload with values that make no sense (bad pattern, zero count).
    #[error("Invalid source spec: {0}")]
    InvalidSpec(String),

    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("Unknown source kind: {0}")]
    UnknownKind(String),
}

/// A source that failed to resolve and was replaced by an empty sequence.
///
/// Carried in the expansion result so callers can tell a broken source
/// apart from one that legitimately has no values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceWarning {
    pub parameter: String,
    pub kind: String,
    pub reason: String,
}

impl fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parameter '{}' ({}) resolved to no values: {}",
            self.parameter, self.kind, self.reason
        )
    }
}
