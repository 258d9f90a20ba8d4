//! Scan-state oracle
//!
//! Asks the catalog whether a library scan is running and how far along it
//! is. A failed query degrades to idle so the poll loop keeps running.

use std::sync::Arc;

use tracing::{info, warn};

use plsync_core::domain::scan::{ScanReading, ScanState};
use plsync_core::ports::catalog::ICatalogService;

pub struct ScanStateOracle {
    catalog: Arc<dyn ICatalogService>,
    freeze_threshold: f64,
}

impl ScanStateOracle {
    /// # Arguments
    /// * `catalog` - Catalog to query
    /// * `freeze_threshold` - Progress percentage at which changes are deferred
    pub fn new(catalog: Arc<dyn ICatalogService>, freeze_threshold: f64) -> Self {
        Self {
            catalog,
            freeze_threshold,
        }
    }

    /// Current scan state derived from the scheduled task listing
    pub async fn current_state(&self) -> ScanReading {
        let tasks = match self.catalog.list_scheduled_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Scan state query failed, assuming idle");
                return ScanReading::idle();
            }
        };

        let reading = ScanReading::from_tasks(&tasks, self.freeze_threshold);
        if let Some(progress) = reading.progress {
            info!(state = %reading.state, progress, "Library scan running");
        }
        reading
    }

    /// Convenience wrapper returning only the state
    pub async fn state(&self) -> ScanState {
        self.current_state().await.state
    }
}
