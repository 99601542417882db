//! Domain error types
//!
//! Validation failures for identifiers, list metadata and record payloads.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown list domain tag
    #[error("Unknown list domain: {0}")]
    UnknownDomain(String),

    /// Unknown urgency label
    #[error("Unknown urgency: {0}")]
    UnknownUrgency(String),

    /// A list name failed validation
    #[error("Invalid list name: {0}")]
    InvalidListName(String),

    /// The reserved aggregate list cannot be used as a write target
    #[error("List {0} is a derived view and cannot be written to")]
    ReadOnlyList(String),

    /// A record could not be converted to or from its document form
    #[error("Record encoding failed: {0}")]
    RecordEncoding(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::RecordEncoding(e.to_string())
    }
}
