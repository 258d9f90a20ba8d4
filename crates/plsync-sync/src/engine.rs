//! Sync decision engine
//!
//! The [`SyncEngine`] propagates a confirmed change from one playlist
//! document of a pair to the other. How it does so depends on the shape of
//! the change and on whether the catalog is scanning its library.
//!
//! ## Policy
//!
//! ```text
//!              | tail append                  | anything else
//! -------------+------------------------------+-------------------------------
//!  idle        | append ids via the API       | overwrite, then refresh
//!  safe        | overwrite, then refresh      | overwrite, then refresh
//!  freeze      | defer                        | defer
//! ```
//!
//! An overwrite rewrites the destination file from the source but keeps the
//! destination's owner and title. The API append needs the catalog id of the
//! destination playlist, which is looked up among its owner's playlists.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use plsync_core::domain::newtypes::{folder_name, ItemId, PlaylistPair, TrackPath, UserId};
use plsync_core::domain::playlist::PlaylistDocument;
use plsync_core::domain::scan::ScanState;
use plsync_core::ports::catalog::ICatalogService;
use plsync_core::ports::playlist_store::IPlaylistStore;

use crate::queue::DeferredQueue;
use crate::resolver::IdentifierResolver;
use crate::SyncError;

// ============================================================================
// Classification
// ============================================================================

/// Shape of the difference between two track sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Same tracks in the same order
    Identical,
    /// The destination is a strict prefix of the source; carries the tail
    Append(Vec<TrackPath>),
    /// Reorders, removals, replacements
    Complex,
}

/// Compares the source's tracks against the destination's
pub fn classify(source: &[TrackPath], destination: &[TrackPath]) -> ChangeKind {
    if source == destination {
        ChangeKind::Identical
    } else if source.len() > destination.len() && source.starts_with(destination) {
        ChangeKind::Append(source[destination.len()..].to_vec())
    } else {
        ChangeKind::Complex
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why a change was not propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// None of the appended tracks is known to the catalog
    NoResolvableTracks,
    /// The destination playlist could not be found in the catalog
    PlaylistNotFound,
    /// The destination document names no owner
    MissingOwner,
}

/// What the engine did with a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Both documents already had the same tracks
    Unchanged,
    /// Nothing was done
    Skipped(SkipReason),
    /// Items were appended through the catalog API
    Appended { added: usize },
    /// The destination document was rewritten from the source
    Overwritten,
    /// The pair was put on the deferred queue
    Deferred,
}

/// `candidate` is `folder` itself or lies below it
fn is_within(candidate: &str, folder: &str) -> bool {
    candidate
        .strip_prefix(folder)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Applies the propagation policy to one directed pair
pub struct SyncEngine {
    catalog: Arc<dyn ICatalogService>,
    documents: Arc<dyn IPlaylistStore>,
}

impl SyncEngine {
    pub fn new(catalog: Arc<dyn ICatalogService>, documents: Arc<dyn IPlaylistStore>) -> Self {
        Self { catalog, documents }
    }

    async fn load_pair(
        &self,
        pair: &PlaylistPair,
    ) -> Result<(PlaylistDocument, PlaylistDocument), SyncError> {
        let source = self.documents.read(&pair.source).await?;
        let destination = self.documents.read(&pair.destination).await?;
        Ok((source, destination))
    }

    /// Propagates a confirmed change from `pair.source` to `pair.destination`
    ///
    /// # Arguments
    /// * `pair` - Directed pair; the source is the side that changed
    /// * `state` - Current library scan state
    /// * `resolver` - Path to id mapping for API appends
    /// * `queue` - Where the pair goes when the scan is about to finish
    ///
    /// # Errors
    /// Returns an error when a document cannot be read or written, or a
    /// catalog call fails. Nothing is recorded in that case and the change
    /// is retried on the next tick.
    pub async fn decide(
        &self,
        pair: &PlaylistPair,
        state: ScanState,
        resolver: &IdentifierResolver,
        queue: &mut DeferredQueue,
    ) -> Result<SyncOutcome, SyncError> {
        let (source, destination) = self.load_pair(pair).await?;

        let kind = classify(&source.tracks(), &destination.tracks());
        debug!(pair = %pair, state = %state, kind = ?kind, "Classified change");

        match kind {
            ChangeKind::Identical => Ok(SyncOutcome::Unchanged),
            ChangeKind::Append(tail) => {
                let ids = resolver.resolve_all(&tail);
                if ids.is_empty() {
                    info!(
                        playlist = %folder_name(&pair.destination),
                        appended = tail.len(),
                        "No appended track is known to the catalog, skipping"
                    );
                    return Ok(SyncOutcome::Skipped(SkipReason::NoResolvableTracks));
                }
                match state {
                    ScanState::Idle => {
                        self.append_via_api(&pair.destination, &destination, &ids)
                            .await
                    }
                    ScanState::Safe => {
                        self.overwrite(pair, &source, &destination).await?;
                        self.request_refresh().await;
                        Ok(SyncOutcome::Overwritten)
                    }
                    ScanState::Freeze => Ok(self.defer(pair, queue)),
                }
            }
            ChangeKind::Complex => match state {
                ScanState::Idle | ScanState::Safe => {
                    self.overwrite(pair, &source, &destination).await?;
                    self.request_refresh().await;
                    Ok(SyncOutcome::Overwritten)
                }
                ScanState::Freeze => Ok(self.defer(pair, queue)),
            },
        }
    }

    /// Applies the idle policy without requesting a refresh
    ///
    /// Used when draining the deferred queue, which issues one refresh for
    /// the whole batch.
    pub async fn propagate_idle(
        &self,
        pair: &PlaylistPair,
        resolver: &IdentifierResolver,
    ) -> Result<SyncOutcome, SyncError> {
        let (source, destination) = self.load_pair(pair).await?;

        match classify(&source.tracks(), &destination.tracks()) {
            ChangeKind::Identical => Ok(SyncOutcome::Unchanged),
            ChangeKind::Append(tail) => {
                let ids = resolver.resolve_all(&tail);
                if ids.is_empty() {
                    return Ok(SyncOutcome::Skipped(SkipReason::NoResolvableTracks));
                }
                self.append_via_api(&pair.destination, &destination, &ids)
                    .await
            }
            ChangeKind::Complex => {
                self.overwrite(pair, &source, &destination).await?;
                Ok(SyncOutcome::Overwritten)
            }
        }
    }

    fn defer(&self, pair: &PlaylistPair, queue: &mut DeferredQueue) -> SyncOutcome {
        queue.enqueue(pair.clone());
        SyncOutcome::Deferred
    }

    /// Rewrites the destination from the source, keeping its identity
    async fn overwrite(
        &self,
        pair: &PlaylistPair,
        source: &PlaylistDocument,
        destination: &PlaylistDocument,
    ) -> Result<(), SyncError> {
        let updated = source.with_identity_of(destination);
        self.documents.write(&pair.destination, &updated).await?;
        info!(
            from = %folder_name(&pair.source),
            to = %folder_name(&pair.destination),
            tracks = source.tracks().len(),
            "Copied playlist document"
        );
        Ok(())
    }

    /// Appends `ids` to the catalog playlist backing `path`
    async fn append_via_api(
        &self,
        path: &Path,
        destination: &PlaylistDocument,
        ids: &[ItemId],
    ) -> Result<SyncOutcome, SyncError> {
        let Some(owner) = destination.owner() else {
            let err = SyncError::NotFound(format!("owner of {}", path.display()));
            warn!(error = %err, "Cannot append without a playlist owner");
            return Ok(SyncOutcome::Skipped(SkipReason::MissingOwner));
        };

        let title = destination.title();
        let Some(playlist) = self.find_playlist(&owner, path, title.as_deref()).await? else {
            let err = SyncError::NotFound(format!("catalog playlist for {}", path.display()));
            warn!(error = %err, owner = %owner, "Skipping API append");
            return Ok(SyncOutcome::Skipped(SkipReason::PlaylistNotFound));
        };

        self.catalog
            .append_playlist_items(&playlist, &owner, ids)
            .await
            .map_err(SyncError::Catalog)?;

        info!(
            playlist = %folder_name(path),
            added = ids.len(),
            "Appended tracks via API"
        );
        Ok(SyncOutcome::Appended { added: ids.len() })
    }

    /// Finds the catalog id of the playlist stored at `path`
    ///
    /// The first playlist whose folder contains `path` wins; failing that,
    /// the first whose name equals `title`.
    pub async fn find_playlist(
        &self,
        owner: &UserId,
        path: &Path,
        title: Option<&str>,
    ) -> Result<Option<ItemId>, SyncError> {
        let playlists = self
            .catalog
            .list_user_playlists(owner)
            .await
            .map_err(SyncError::Catalog)?;

        let folder = path
            .parent()
            .map(|p| p.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if !folder.is_empty() {
            let by_path = playlists.iter().find(|p| {
                p.path
                    .as_deref()
                    .is_some_and(|candidate| is_within(&candidate.to_lowercase(), &folder))
            });
            if let Some(found) = by_path {
                return Ok(Some(found.id.clone()));
            }
        }

        Ok(title.and_then(|title| {
            playlists
                .iter()
                .find(|p| p.name.as_deref() == Some(title))
                .map(|p| p.id.clone())
        }))
    }

    /// Asks the catalog to rescan; a failure is logged only
    ///
    /// Returns whether the request was accepted.
    pub async fn request_refresh(&self) -> bool {
        match self.catalog.refresh_library().await {
            Ok(()) => {
                info!("Library refresh requested");
                true
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Library refresh request failed");
                false
            }
        }
    }
}
