//! Tracing subscriber setup
//!
//! Logs go to stderr and, when `logging.file` is set, to a plain-text file.
//! The file rolls over to `<file>.1` whenever a write would take it past
//! `max_size_mb`, keeping a single backup.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use plsync_core::config::LoggingConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Path of the single backup kept by [`RollingFile`]
pub fn backup_path(file: &Path) -> PathBuf {
    let mut backup = file.as_os_str().to_owned();
    backup.push(".1");
    PathBuf::from(backup)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ============================================================================
// RollingFile
// ============================================================================

/// Size-bounded log file usable as a `fmt` layer writer
pub struct RollingFile {
    state: Mutex<RollingState>,
}

struct RollingState {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
}

impl RollingFile {
    /// Opens `path` for appending
    ///
    /// A `max_size_mb` of zero disables rollover.
    ///
    /// # Errors
    /// Fails if the file cannot be opened or inspected.
    pub fn open(path: &Path, max_size_mb: u64) -> io::Result<Self> {
        let file = open_append(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            state: Mutex::new(RollingState {
                path: path.to_path_buf(),
                file,
                size,
                max_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RollingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RollingState {
    fn roll(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, backup_path(&self.path))?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

impl Write for RollingState {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let incoming = buf.len() as u64;
        if self.max_bytes > 0 && self.size > 0 && self.size + incoming > self.max_bytes {
            self.roll()?;
        }
        let written = self.file.write(buf)?;
        self.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writer handed out per event; holds the file lock for the whole event
pub struct RollingWriter<'a>(MutexGuard<'a, RollingState>);

impl Write for RollingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingFile {
    type Writer = RollingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RollingWriter(self.lock())
    }
}

// ============================================================================
// Subscriber
// ============================================================================

/// `RUST_LOG` when set, otherwise `level`
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs the global subscriber
///
/// # Arguments
/// * `config` - Logging section of the configuration
/// * `level_override` - Level from the command line, taking precedence over
///   the configured one
///
/// # Errors
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(config: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    let level = level_override.unwrap_or(config.level.as_str());

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let writer = RollingFile::open(path, config.max_size_mb)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
