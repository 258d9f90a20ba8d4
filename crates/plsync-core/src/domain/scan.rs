//! Library scan state
//!
//! Reduces the catalog's scheduled-task listing to the tri-state signal the
//! decision engine gates on.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ports::catalog::ScheduledTask;

/// Scan progress (percent) at or above which writes are frozen
pub const DEFAULT_FREEZE_THRESHOLD: f64 = 86.0;

/// Task key the catalog uses for its library scan
const LIBRARY_SCAN_KEY: &str = "RefreshLibrary";

/// Task state reported for an in-flight task
const RUNNING_STATE: &str = "Running";

/// How disruptive a write-triggering operation would currently be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    /// No library scan is running
    Idle,
    /// A scan is running but has not reached the freeze threshold
    Safe,
    /// A scan is running at or above the freeze threshold
    Freeze,
}

impl Display for ScanState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanState::Idle => "idle",
            ScanState::Safe => "safe",
            ScanState::Freeze => "freeze",
        };
        f.write_str(s)
    }
}

/// A scan state together with the progress it was derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanReading {
    /// Reduced state
    pub state: ScanState,
    /// Highest progress among running scan tasks, `None` when none run
    pub progress: Option<f64>,
}

impl ScanReading {
    /// Reading used when no scan is running (or status is unavailable)
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            state: ScanState::Idle,
            progress: None,
        }
    }

    /// Reduces a task listing to a reading
    ///
    /// Library-scan tasks are those whose name mentions both "scan" and
    /// "library", or whose key is `RefreshLibrary`. Only running tasks count.
    #[must_use]
    pub fn from_tasks(tasks: &[ScheduledTask], freeze_threshold: f64) -> Self {
        let progress = tasks
            .iter()
            .filter(|t| is_library_scan(t) && t.state == RUNNING_STATE)
            .map(|t| t.progress_percent.unwrap_or(0.0))
            .fold(None, |best: Option<f64>, pct| {
                Some(best.map_or(pct, |b| b.max(pct)))
            });

        match progress {
            None => Self::idle(),
            Some(pct) if pct < freeze_threshold => Self {
                state: ScanState::Safe,
                progress: Some(pct),
            },
            Some(pct) => Self {
                state: ScanState::Freeze,
                progress: Some(pct),
            },
        }
    }
}

fn is_library_scan(task: &ScheduledTask) -> bool {
    let name = task.name.to_lowercase();
    (name.contains("scan") && name.contains("library")) || task.key == LIBRARY_SCAN_KEY
}
