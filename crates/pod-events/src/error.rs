//! Error types for event parsing and chip filtering.

use thiserror::Error;

/// A stream line that could not be turned into an event.
///
/// Parse errors are never fatal: the offending line is skipped.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Line is not valid JSON or has the wrong shape
    #[error("invalid event record: {0}")]
    Json(#[from] serde_json::Error),

    /// Required field absent or empty
    #[error("event record is missing `{0}`")]
    MissingField(&'static str),

    /// Timestamp not in RFC 3339 form
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Errors building a chip set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The same (field, value) pair was added twice
    #[error("duplicate filter chip {field}:{value}")]
    DuplicateChip { field: String, value: String },

    /// Field id not recognised
    #[error("unknown filter field: {0}")]
    UnknownField(String),

    /// Query pair not in `field:value` form
    #[error("malformed filter chip: {0:?}")]
    Malformed(String),
}
