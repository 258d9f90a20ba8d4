//! plsync Sync - playlist change detection and propagation
//!
//! Provides:
//! - Canonical fingerprints of playlist documents and change detection
//! - Library-scan aware propagation (API append, overwrite, deferral)
//! - Path to catalog id resolution with a persistent cache
//! - The debounced, bidirectional poll loop
//!
//! ## Modules
//!
//! - [`document`] - `playlist.xml` adapter (quick-xml parsing, atomic writes)
//! - [`fingerprint`] - Persisted fingerprint table
//! - [`debounce`] - First-seen debounce timers
//! - [`scan_state`] - Library scan state oracle
//! - [`resolver`] - Identifier resolver and cache
//! - [`engine`] - Change classification and propagation policy
//! - [`queue`] - Changes deferred while a scan is finishing
//! - [`service`] - The poll loop owning all of the above

pub mod debounce;
pub mod document;
pub mod engine;
pub mod fingerprint;
pub mod queue;
pub mod resolver;
pub mod scan_state;
pub mod service;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::PathBuf;

use thiserror::Error;

use plsync_core::domain::errors::DocumentError;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A file is temporarily unavailable; the action is retried next tick
    #[error("Transient I/O error on {}: {source}", path.display())]
    TransientIo {
        /// The file involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The catalog request failed (network, HTTP status, bad response)
    #[error("Catalog error: {0:#}")]
    Catalog(anyhow::Error),

    /// An expected catalog entity is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The environment cannot support syncing at all
    #[error("Fatal configuration error: {0}")]
    ConfigurationFatal(String),

    /// A playlist file could not be parsed
    #[error("Malformed playlist document {}: {reason}", path.display())]
    MalformedDocument {
        /// The file involved
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },
}

impl SyncError {
    /// Whether the process should stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::ConfigurationFatal(_))
    }

    /// Whether the failed action should stay pending and be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::TransientIo { .. }
                | SyncError::Catalog(_)
                | SyncError::MalformedDocument { .. }
        )
    }
}

impl From<DocumentError> for SyncError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Io { path, source } => SyncError::TransientIo { path, source },
            DocumentError::Malformed { path, reason } => {
                SyncError::MalformedDocument { path, reason }
            }
        }
    }
}
