//! Error types for the store engine.

use crate::{CollectionName, NodeId, RecordId, SchemaVersion};
use thiserror::Error;

/// Ways an operation or snapshot can fail to conform to the store schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("unknown collection: {0}")]
    UnknownCollection(CollectionName),

    #[error("unknown field '{field}' in collection '{collection}'")]
    UnknownField {
        collection: CollectionName,
        field: String,
    },

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch {
        expected: SchemaVersion,
        actual: SchemaVersion,
    },
}

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("schema violation: {0}")]
    SchemaViolation(#[from] SchemaViolation),

    #[error("record not found: {collection}/{id}")]
    NotFound {
        collection: CollectionName,
        id: RecordId,
    },

    #[error("unsupported snapshot format version {found} (supported up to {supported})")]
    UnsupportedSnapshotVersion { found: i32, supported: i32 },

    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    #[error("logical clock of node '{node_id}' is exhausted")]
    ClockExhausted { node_id: NodeId },
}

impl Error {
    /// Stable machine-readable identifier, used in boundary payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Error::MalformedInput(_) => "malformed_input",
            Error::SchemaViolation(_) => "schema_violation",
            Error::NotFound { .. } => "not_found",
            Error::UnsupportedSnapshotVersion { .. } => "unsupported_snapshot_version",
            Error::AllocationFailure(_) => "allocation_failure",
            Error::ClockExhausted { .. } => "clock_exhausted",
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedInput(message.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::MalformedInput(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
