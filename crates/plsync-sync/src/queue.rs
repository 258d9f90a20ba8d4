//! Deferred change queue
//!
//! Changes detected while a library scan is close to finishing are parked
//! here instead of being applied, because the scan would overwrite them. Once
//! the catalog is idle again the queue is drained with the idle policy and a
//! single library refresh covers every rewritten document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use plsync_core::domain::newtypes::{folder_name, PlaylistPair};
use plsync_core::domain::scan::ScanState;

use crate::engine::{SyncEngine, SyncOutcome};
use crate::resolver::IdentifierResolver;

/// Result of one drain attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Pairs removed from the queue
    pub flushed: usize,
    /// Pairs propagated through the append API
    pub appended: usize,
    /// Pairs whose destination was rewritten
    pub overwritten: usize,
    /// Pairs left queued after a retryable failure
    pub retained: usize,
    /// Whether the batch refresh was requested
    pub refreshed: bool,
}

/// Set of directed pairs awaiting an idle catalog
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: BTreeMap<PlaylistPair, DateTime<Utc>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `pair` unless it is already queued
    ///
    /// A queued pair running the opposite way is replaced, so only the most
    /// recent edit of the two files is propagated. Returns `true` when the
    /// pair was newly queued.
    pub fn enqueue(&mut self, pair: PlaylistPair) -> bool {
        if self.pending.contains_key(&pair) {
            return false;
        }
        if self.pending.remove(&pair.reversed()).is_some() {
            info!(pair = %pair, "Newer edit replaces the queued opposite direction");
        }
        info!(playlist = %folder_name(&pair.source), "Change queued until the library scan ends");
        self.pending.insert(pair, Utc::now());
        true
    }

    pub fn contains(&self, pair: &PlaylistPair) -> bool {
        self.pending.contains_key(pair)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains the queue when `state` is idle; otherwise does nothing
    ///
    /// Pairs are processed in sorted order. A pair whose propagation fails
    /// with a retryable error stays queued. If at least one destination was
    /// rewritten, one library refresh is requested at the end.
    pub async fn flush_if_idle(
        &mut self,
        state: ScanState,
        engine: &SyncEngine,
        resolver: &IdentifierResolver,
    ) -> FlushSummary {
        let mut summary = FlushSummary::default();
        if state != ScanState::Idle || self.pending.is_empty() {
            return summary;
        }

        info!(pending = self.pending.len(), "Flushing deferred changes");
        let pairs: Vec<PlaylistPair> = self.pending.keys().cloned().collect();

        for pair in pairs {
            match engine.propagate_idle(&pair, resolver).await {
                Ok(outcome) => {
                    if let Some(queued_at) = self.pending.remove(&pair) {
                        let waited = (Utc::now() - queued_at).num_seconds();
                        info!(pair = %pair, outcome = ?outcome, waited_secs = waited, "Flushed deferred change");
                    }
                    summary.flushed += 1;
                    match outcome {
                        SyncOutcome::Appended { .. } => summary.appended += 1,
                        SyncOutcome::Overwritten => summary.overwritten += 1,
                        _ => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(pair = %pair, error = %e, "Deferred change failed, keeping it queued");
                    summary.retained += 1;
                }
                Err(e) => {
                    warn!(pair = %pair, error = %e, "Dropping deferred change");
                    self.pending.remove(&pair);
                    summary.flushed += 1;
                }
            }
        }

        if summary.overwritten > 0 {
            summary.refreshed = engine.request_refresh().await;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::test_support::{doc, CatalogCall, MemoryPlaylistStore, MockCatalog};
    use tempfile::TempDir;

    struct Fixture {
        catalog: Arc<MockCatalog>,
        documents: Arc<MemoryPlaylistStore>,
        engine: SyncEngine,
        resolver: IdentifierResolver,
        _dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(MockCatalog::with_music_library());
        catalog.set_items(&[("id-a", "/m/a.flac"), ("id-b", "/m/b.flac")]);
        catalog.add_playlist("owner", "pl-1", "One", Some("/pl/one-copy"));
        let documents = Arc::new(MemoryPlaylistStore::new());
        let mut resolver =
            IdentifierResolver::load(catalog.clone(), dir.path().join("ids.json"), 100).await;
        resolver.rebuild(true).await.unwrap();
        catalog.clear_calls();
        Fixture {
            engine: SyncEngine::new(catalog.clone(), documents.clone()),
            catalog,
            documents,
            resolver,
            _dir: dir,
        }
    }

    fn pair(n: &str) -> PlaylistPair {
        PlaylistPair::new(format!("/pl/{n}/playlist.xml"), format!("/pl/{n}-copy/playlist.xml"))
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let mut queue = DeferredQueue::new();
        assert!(queue.enqueue(pair("one")));
        assert!(!queue.enqueue(pair("one")));
        assert!(queue.enqueue(pair("two")));
        assert_eq!(queue.len(), 2);
        assert!(queue.contains(&pair("one")));
    }

    #[test]
    fn test_reverse_direction_replaces_queued_pair() {
        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("one"));
        queue.enqueue(pair("two"));

        assert!(queue.enqueue(pair("one").reversed()));
        assert_eq!(queue.len(), 2);
        assert!(queue.contains(&pair("one").reversed()));
        assert!(!queue.contains(&pair("one")));
        assert!(queue.contains(&pair("two")));
    }

    #[tokio::test]
    async fn test_flush_propagates_only_latest_direction() {
        let f = fixture().await;
        f.documents.put(
            "/pl/one/playlist.xml",
            doc(Some("owner"), Some("One"), &["/m/a.flac", "/m/b.flac"]),
        );
        f.documents.put(
            "/pl/one-copy/playlist.xml",
            doc(Some("owner"), Some("One"), &["/m/b.flac", "/m/a.flac"]),
        );

        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("one"));
        queue.enqueue(pair("one").reversed());
        let summary = queue
            .flush_if_idle(ScanState::Idle, &f.engine, &f.resolver)
            .await;

        assert_eq!(summary.flushed, 1);
        assert_eq!(summary.overwritten, 1);
        let writes = f.documents.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], PathBuf::from("/pl/one/playlist.xml"));
    }

    #[tokio::test]
    async fn test_no_flush_unless_idle() {
        let f = fixture().await;
        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("one"));

        for state in [ScanState::Safe, ScanState::Freeze] {
            let summary = queue.flush_if_idle(state, &f.engine, &f.resolver).await;
            assert_eq!(summary, FlushSummary::default());
        }
        assert_eq!(queue.len(), 1);
        assert!(f.catalog.calls().is_empty());
    }

    #[tokio::test]
    async fn test_flush_appends_and_refreshes_once() {
        let f = fixture().await;
        // tail append, flushed through the API
        f.documents.put(
            "/pl/one/playlist.xml",
            doc(Some("owner"), Some("One"), &["/m/a.flac", "/m/b.flac"]),
        );
        f.documents
            .put("/pl/one-copy/playlist.xml", doc(Some("owner"), Some("One"), &["/m/a.flac"]));
        // two reorders, rewritten
        for n in ["two", "three"] {
            f.documents.put(
                format!("/pl/{n}/playlist.xml"),
                doc(Some("owner"), Some(n), &["/m/b.flac", "/m/a.flac"]),
            );
            f.documents.put(
                format!("/pl/{n}-copy/playlist.xml"),
                doc(Some("owner"), Some(n), &["/m/a.flac", "/m/b.flac"]),
            );
        }

        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("one"));
        queue.enqueue(pair("two"));
        queue.enqueue(pair("three"));

        let summary = queue
            .flush_if_idle(ScanState::Idle, &f.engine, &f.resolver)
            .await;

        assert_eq!(summary.flushed, 3);
        assert_eq!(summary.appended, 1);
        assert_eq!(summary.overwritten, 2);
        assert!(summary.refreshed);
        assert!(queue.is_empty());
        assert_eq!(f.catalog.refresh_count(), 1);
        assert!(matches!(
            f.catalog.mutating_calls().first(),
            Some(CatalogCall::Append { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_flush_is_noop() {
        let f = fixture().await;
        f.documents
            .put("/pl/two/playlist.xml", doc(Some("owner"), Some("Two"), &["/m/b.flac"]));
        f.documents
            .put("/pl/two-copy/playlist.xml", doc(Some("owner"), Some("Two"), &["/m/a.flac"]));

        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("two"));
        queue
            .flush_if_idle(ScanState::Idle, &f.engine, &f.resolver)
            .await;
        f.catalog.clear_calls();

        let again = queue
            .flush_if_idle(ScanState::Idle, &f.engine, &f.resolver)
            .await;
        assert_eq!(again, FlushSummary::default());
        assert!(f.catalog.calls().is_empty());
        assert_eq!(f.documents.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_pair_stays_queued() {
        let f = fixture().await;
        f.documents
            .put("/pl/two/playlist.xml", doc(Some("owner"), Some("Two"), &["/m/b.flac"]));
        f.documents.set_malformed("/pl/two-copy/playlist.xml", true);

        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("two"));
        let summary = queue
            .flush_if_idle(ScanState::Idle, &f.engine, &f.resolver)
            .await;

        assert_eq!(summary.retained, 1);
        assert!(!summary.refreshed);
        assert!(queue.contains(&pair("two")));
        assert_eq!(f.catalog.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_append_only_flush_needs_no_refresh() {
        let f = fixture().await;
        f.documents.put(
            "/pl/one/playlist.xml",
            doc(Some("owner"), Some("One"), &["/m/a.flac", "/m/b.flac"]),
        );
        f.documents
            .put("/pl/one-copy/playlist.xml", doc(Some("owner"), Some("One"), &["/m/a.flac"]));

        let mut queue = DeferredQueue::new();
        queue.enqueue(pair("one"));
        let summary = queue
            .flush_if_idle(ScanState::Idle, &f.engine, &f.resolver)
            .await;

        assert_eq!(summary.appended, 1);
        assert!(!summary.refreshed);
        assert_eq!(f.catalog.refresh_count(), 0);
    }
}
