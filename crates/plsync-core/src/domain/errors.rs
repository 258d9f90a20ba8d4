//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! validation failures on newtypes, and failures reading or writing
//! playlist documents.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid digest format (expected lowercase hex)
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Catalog identifier is empty or malformed
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Errors raised by a playlist document store
///
/// The two variants drive different recovery: an I/O failure is transient
/// and retried next tick, a malformed document is treated as "unknown".
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The document path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a well-formed playlist document
    #[error("Malformed playlist document {}: {reason}", path.display())]
    Malformed {
        /// The document path
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },
}

impl DocumentError {
    /// Returns the path of the document that failed
    pub fn path(&self) -> &std::path::Path {
        match self {
            DocumentError::Io { path, .. } => path,
            DocumentError::Malformed { path, .. } => path,
        }
    }
}
