//! Change fingerprint store
//!
//! Remembers the last fingerprint seen for every configured playlist file
//! and answers "has this file changed since we last acted on it?". The table
//! is persisted write-through so a restart does not replay old changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use plsync_core::domain::newtypes::{Fingerprint, PlaylistPair};
use plsync_core::ports::playlist_store::IPlaylistStore;

use crate::state::PersistedMap;

/// Persisted path -> fingerprint table
pub struct FingerprintStore {
    documents: Arc<dyn IPlaylistStore>,
    table: PersistedMap<Fingerprint>,
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl FingerprintStore {
    /// Loads the table from `state_file`
    ///
    /// # Arguments
    /// * `state_file` - JSON file holding the table
    /// * `documents` - Store used to compute fresh fingerprints
    pub async fn load(state_file: impl Into<PathBuf>, documents: Arc<dyn IPlaylistStore>) -> Self {
        let table = PersistedMap::load(state_file).await;
        Self { documents, table }
    }

    /// Computes the current fingerprint of `path`
    ///
    /// Returns `None` when the file cannot be read or parsed; callers treat
    /// that as "unknown" and try again next tick.
    pub async fn observe(&self, path: &Path) -> Option<Fingerprint> {
        self.documents.fingerprint(path).await
    }

    /// Last recorded fingerprint for `path`
    pub fn stored(&self, path: &Path) -> Option<&Fingerprint> {
        self.table.get(&key(path))
    }

    /// True when `current` differs from the recorded fingerprint
    ///
    /// A path that was never recorded counts as changed.
    pub fn has_changed(&self, path: &Path, current: &Fingerprint) -> bool {
        self.stored(path) != Some(current)
    }

    /// Records `fingerprint` for `path` and persists the table
    ///
    /// # Errors
    /// Fails if the state file cannot be written; the in-memory value is
    /// updated regardless.
    pub async fn record(&mut self, path: &Path, fingerprint: Fingerprint) -> Result<()> {
        self.table.insert(key(path), fingerprint);
        self.table.persist().await
    }

    /// Seeds an entry for every pair member that has none yet
    ///
    /// Files already in the table keep their value, so changes made while
    /// the daemon was down are still detected. Unreadable files are left
    /// unrecorded. The table is persisted once at the end.
    pub async fn seed(&mut self, pairs: &[PlaylistPair]) -> Result<usize> {
        let mut seeded = 0;
        for pair in pairs {
            for path in [&pair.source, &pair.destination] {
                if self.table.contains_key(&key(path)) {
                    continue;
                }
                if let Some(fp) = self.observe(path).await {
                    debug!(path = %path.display(), "Seeding fingerprint");
                    self.table.insert(key(path), fp);
                    seeded += 1;
                }
            }
        }
        self.table.persist().await?;
        info!(seeded, total = self.table.len(), "Fingerprint table ready");
        Ok(seeded)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
