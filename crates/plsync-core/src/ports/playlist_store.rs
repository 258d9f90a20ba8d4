//! Playlist document store port (driven/secondary port)
//!
//! Reading, writing and fingerprinting of playlist files. The catalog may be
//! rewriting these files concurrently, so read failures are expected and the
//! error type distinguishes transient I/O from malformed content.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::errors::DocumentError;
use crate::domain::newtypes::Fingerprint;
use crate::domain::playlist::PlaylistDocument;

/// Port trait for playlist document persistence
#[async_trait]
pub trait IPlaylistStore: Send + Sync {
    /// Reads and parses the document at `path`
    async fn read(&self, path: &Path) -> Result<PlaylistDocument, DocumentError>;

    /// Replaces the document at `path`
    async fn write(&self, path: &Path, document: &PlaylistDocument) -> Result<(), DocumentError>;

    /// Digest over the normalized document
    ///
    /// Returns `None` when the file cannot be read or parsed right now.
    async fn fingerprint(&self, path: &Path) -> Option<Fingerprint>;
}
