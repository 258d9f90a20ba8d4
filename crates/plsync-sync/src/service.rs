//! Sync service - the poll loop
//!
//! [`SyncService`] owns every piece of mutable sync state and advances it
//! one [`tick`](SyncService::tick) at a time. [`run`](SyncService::run)
//! sleeps between ticks until the cancellation token fires.
//!
//! ## Tick
//!
//! ```text
//! sleep ──→ cache refresh (when due) ──→ scan state ──→ flush queue (idle)
//!                                                            │
//!        for each pair: fingerprints ──→ debounce ──→ SyncEngine::decide
//! ```
//!
//! Each pair is swept in both directions: a source change is pushed to the
//! destination, otherwise a destination change is pushed back to the source.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use plsync_core::config::Config;
use plsync_core::domain::newtypes::{Fingerprint, PlaylistPair};
use plsync_core::domain::scan::{ScanReading, ScanState};
use plsync_core::ports::catalog::ICatalogService;
use plsync_core::ports::clock::IClock;
use plsync_core::ports::playlist_store::IPlaylistStore;

use crate::debounce::DebounceTable;
use crate::engine::{SyncEngine, SyncOutcome};
use crate::fingerprint::FingerprintStore;
use crate::queue::{DeferredQueue, FlushSummary};
use crate::resolver::IdentifierResolver;
use crate::scan_state::ScanStateOracle;
use crate::SyncError;

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    /// Scan state the tick acted under
    pub scan: ScanReading,
    /// Whether the identifier cache was refreshed
    pub cache_refreshed: bool,
    /// Deferred queue drain result
    pub flush: FlushSummary,
    /// Directed pairs the engine acted on, with their outcome
    pub synced: Vec<(PlaylistPair, SyncOutcome)>,
    /// Engine invocations that failed and will be retried
    pub errors: usize,
}

/// The playlist synchronizer
pub struct SyncService {
    pairs: Vec<PlaylistPair>,
    clock: Arc<dyn IClock>,
    engine: SyncEngine,
    oracle: ScanStateOracle,
    resolver: IdentifierResolver,
    fingerprints: FingerprintStore,
    debounce: DebounceTable,
    queue: DeferredQueue,
    cache_refresh_interval: Duration,
    next_cache_refresh: Instant,
}

impl SyncService {
    // ========================================================================
    // Startup
    // ========================================================================

    /// Builds the service and loads persisted state
    ///
    /// Locates the music library, rebuilds the identifier cache from
    /// scratch and seeds fingerprints for files not seen before.
    ///
    /// # Errors
    /// Returns [`SyncError::ConfigurationFatal`] when the catalog has no
    /// music library. Other startup failures are logged and the service
    /// starts with whatever state was on disk.
    pub async fn start(
        config: &Config,
        catalog: Arc<dyn ICatalogService>,
        documents: Arc<dyn IPlaylistStore>,
        clock: Arc<dyn IClock>,
    ) -> Result<Self, SyncError> {
        info!(pairs = config.sync.pairs.len(), "Starting playlist sync service");

        let mut resolver = IdentifierResolver::load(
            Arc::clone(&catalog),
            &config.state.identifier_cache,
            config.catalog.page_size,
        )
        .await;
        match resolver.rebuild(true).await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(error = %e, "Initial identifier cache build failed, using cached ids"),
        }

        let mut fingerprints =
            FingerprintStore::load(&config.state.fingerprints, Arc::clone(&documents)).await;
        if let Err(e) = fingerprints.seed(&config.sync.pairs).await {
            warn!(error = %format!("{e:#}"), "Failed to persist seeded fingerprints");
        }

        let cache_refresh_interval = config.sync.cache_refresh_interval();
        let next_cache_refresh = clock.now() + cache_refresh_interval;

        Ok(Self {
            pairs: config.sync.pairs.clone(),
            engine: SyncEngine::new(Arc::clone(&catalog), documents),
            oracle: ScanStateOracle::new(catalog, config.sync.freeze_threshold_percent),
            resolver,
            fingerprints,
            debounce: DebounceTable::new(config.sync.debounce_delay()),
            queue: DeferredQueue::new(),
            cache_refresh_interval,
            next_cache_refresh,
            clock,
        })
    }

    // ========================================================================
    // Poll loop
    // ========================================================================

    /// Runs ticks every `poll_interval` until `shutdown` is cancelled
    pub async fn run(&mut self, poll_interval: Duration, shutdown: CancellationToken) {
        info!(
            poll_interval_secs = poll_interval.as_secs(),
            pairs = self.pairs.len(),
            "Starting poll loop"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }

            let summary = self.tick().await;
            if !summary.synced.is_empty() || summary.flush.flushed > 0 || summary.errors > 0 {
                info!(
                    scan = %summary.scan.state,
                    synced = summary.synced.len(),
                    flushed = summary.flush.flushed,
                    errors = summary.errors,
                    "Tick completed"
                );
            }
        }

        info!(queued = self.queue.len(), "Poll loop terminated");
    }

    /// Runs one iteration of the loop body
    pub async fn tick(&mut self) -> TickSummary {
        let now = self.clock.now();

        let mut cache_refreshed = false;
        if now >= self.next_cache_refresh {
            match self.resolver.rebuild(false).await {
                Ok(added) => {
                    debug!(added, "Periodic identifier cache refresh done");
                    cache_refreshed = true;
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Identifier cache refresh failed")
                }
                Err(e) => warn!(error = %e, "Identifier cache refresh failed"),
            }
            self.next_cache_refresh = now + self.cache_refresh_interval;
        }

        let scan = self.oracle.current_state().await;

        let flush = self
            .queue
            .flush_if_idle(scan.state, &self.engine, &self.resolver)
            .await;

        let mut synced = Vec::new();
        let mut errors = 0;
        for pair in self.pairs.clone() {
            match self.sweep_pair(&pair, scan.state, now).await {
                Some(Ok(acted)) => synced.push(acted),
                Some(Err(e)) => {
                    warn!(pair = %pair, error = %e, "Sync failed, will retry next tick");
                    errors += 1;
                }
                None => {}
            }
        }

        TickSummary {
            scan,
            cache_refreshed,
            flush,
            synced,
            errors,
        }
    }

    /// Checks one pair and acts on a debounced change
    ///
    /// Returns `None` when there was nothing to do this tick.
    async fn sweep_pair(
        &mut self,
        pair: &PlaylistPair,
        state: ScanState,
        now: Instant,
    ) -> Option<Result<(PlaylistPair, SyncOutcome), SyncError>> {
        let src_fp = self.fingerprints.observe(&pair.source).await;
        let dst_fp = self.fingerprints.observe(&pair.destination).await;
        let (Some(src_fp), Some(dst_fp)) = (src_fp, dst_fp) else {
            debug!(pair = %pair, "Fingerprint unavailable, skipping pair this tick");
            return None;
        };

        let src_changed = self.fingerprints.has_changed(&pair.source, &src_fp);
        let dst_changed = self.fingerprints.has_changed(&pair.destination, &dst_fp);
        if !src_changed {
            self.debounce.clear(&pair.source);
        }
        if !dst_changed {
            self.debounce.clear(&pair.destination);
        }

        let (directed, changed_fp) = if src_changed {
            (pair.clone(), src_fp)
        } else if dst_changed {
            (pair.reversed(), dst_fp)
        } else {
            return None;
        };

        if !self.debounce.observe(&directed.source, now) {
            return None;
        }

        info!(from = %directed.source.display(), "Change confirmed, syncing");
        let result = self
            .engine
            .decide(&directed, state, &self.resolver, &mut self.queue)
            .await;

        match result {
            Ok(outcome) => {
                self.settle(&directed, changed_fp).await;
                Some(Ok((directed, outcome)))
            }
            Err(e) => Some(Err(e)),
        }
    }

    /// Records both sides as seen and clears their timers
    async fn settle(&mut self, directed: &PlaylistPair, source_fp: Fingerprint) {
        self.record(&directed.source, Some(source_fp)).await;
        let target_fp = self.fingerprints.observe(&directed.destination).await;
        self.record(&directed.destination, target_fp).await;
        self.debounce.clear(&directed.source);
        self.debounce.clear(&directed.destination);
    }

    async fn record(&mut self, path: &Path, fingerprint: Option<Fingerprint>) {
        let Some(fingerprint) = fingerprint else {
            debug!(path = %path.display(), "Fingerprint unavailable after sync, not recorded");
            return;
        };
        if let Err(e) = self.fingerprints.record(path, fingerprint).await {
            warn!(error = %format!("{e:#}"), "Failed to persist fingerprints");
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn pairs(&self) -> &[PlaylistPair] {
        &self.pairs
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether a change on `path` is waiting out its debounce delay
    pub fn is_debouncing(&self, path: &Path) -> bool {
        self.debounce.contains(path)
    }

    pub fn stored_fingerprint(&self, path: &Path) -> Option<&Fingerprint> {
        self.fingerprints.stored(path)
    }

    pub fn cached_ids(&self) -> usize {
        self.resolver.len()
    }
}
