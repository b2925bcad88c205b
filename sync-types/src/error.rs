//! Error types for the rowsync wire format.

use thiserror::Error;

/// Errors raised while converting between domain values, wire atoms and JSON.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WireError {
    /// A domain value has no wire representation (null, non-finite floats).
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A JSON value does not describe a valid atom.
    #[error("malformed atom: {0}")]
    MalformedAtom(String),

    /// Unknown row-level change tag.
    #[error("unknown change type: {0}")]
    UnknownOp(String),

    /// Unknown field operation tag.
    #[error("unknown field op type: {0}")]
    UnknownFieldOp(String),

    /// Structurally invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors raised while decoding an authority response body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body does not have the shape the endpoint answers with.
    #[error("invalid response body: {0}")]
    Shape(#[from] serde_json::Error),

    /// A change or row inside a well-formed body is not valid wire data.
    #[error(transparent)]
    Wire(#[from] WireError),
}
