//! Configuration module for plsync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! JSON configuration files load as well, JSON being a subset of YAML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::PlaylistPair;
use crate::domain::scan::DEFAULT_FREEZE_THRESHOLD;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for plsync.
///
/// `catalog` and `sync.pairs` are required; every other field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub sync: SyncConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Catalog (Jellyfin) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog server, e.g. `http://jellyfin:8096`.
    pub url: String,
    /// API key sent as `X-Emby-Token`.
    pub api_key: String,
    /// Seconds before an HTTP request is abandoned.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Items fetched per page while building the identifier cache.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Maximum playlists listed when locating a destination playlist.
    #[serde(default = "default_playlist_lookup_limit")]
    pub playlist_lookup_limit: u32,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds slept between poll ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Seconds a change must have been observed before it is acted on.
    #[serde(default = "default_debounce_delay")]
    pub debounce_delay: u64,
    /// Seconds between incremental identifier cache refreshes.
    #[serde(default = "default_cache_refresh_interval")]
    pub cache_refresh_interval: u64,
    /// Scan progress (percent) at or above which writes are deferred.
    #[serde(default = "default_freeze_threshold_percent")]
    pub freeze_threshold_percent: f64,
    /// Configured playlist pairs, processed in list order.
    pub pairs: Vec<PlaylistPair>,
}

/// Locations of persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Fingerprint table (path -> digest), JSON.
    pub fingerprints: PathBuf,
    /// Identifier cache (lowercased track path -> item id), JSON.
    pub identifier_cache: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Optional log file, written in addition to stderr.
    pub file: Option<PathBuf>,
    /// Size (in MiB) past which the log file is rolled over to `<file>.1`.
    pub max_size_mb: u64,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_page_size() -> u32 {
    1000
}

fn default_playlist_lookup_limit() -> u32 {
    200
}

fn default_poll_interval() -> u64 {
    5
}

fn default_debounce_delay() -> u64 {
    10
}

fn default_cache_refresh_interval() -> u64 {
    3600
}

fn default_freeze_threshold_percent() -> f64 {
    DEFAULT_FREEZE_THRESHOLD
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("plsync")
}

impl Default for StateConfig {
    fn default() -> Self {
        let dir = data_dir();
        Self {
            fingerprints: dir.join("fingerprints.json"),
            identifier_cache: dir.join("item_ids.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_size_mb: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load and validate configuration from a YAML (or JSON) file at `path`.
    ///
    /// # Errors
    /// Fails when the file cannot be read, a required field is missing,
    /// or any validation rule is violated.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        let errors = config.validate();
        if !errors.is_empty() {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            anyhow::bail!("invalid configuration in {}: {joined}", path.display());
        }
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/plsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("plsync")
            .join("config.yaml")
    }
}

impl SyncConfig {
    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Debounce delay as a [`Duration`].
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_secs(self.debounce_delay)
    }

    /// Cache refresh interval as a [`Duration`].
    pub fn cache_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cache_refresh_interval)
    }
}

impl CatalogConfig {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- catalog ---
        let url = self.catalog.url.trim();
        if url.is_empty() {
            errors.push(ValidationError {
                field: "catalog.url".into(),
                message: "must not be empty".into(),
            });
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "catalog.url".into(),
                message: format!("must start with http:// or https://, got '{url}'"),
            });
        }
        if self.catalog.api_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "catalog.api_key".into(),
                message: "must not be empty".into(),
            });
        }
        if self.catalog.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "catalog.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.catalog.page_size == 0 {
            errors.push(ValidationError {
                field: "catalog.page_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.catalog.playlist_lookup_limit == 0 {
            errors.push(ValidationError {
                field: "catalog.playlist_lookup_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.poll_interval == 0 {
            errors.push(ValidationError {
                field: "sync.poll_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.cache_refresh_interval == 0 {
            errors.push(ValidationError {
                field: "sync.cache_refresh_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        let threshold = self.sync.freeze_threshold_percent;
        if !(threshold > 0.0 && threshold <= 100.0) {
            errors.push(ValidationError {
                field: "sync.freeze_threshold_percent".into(),
                message: "must be in range (0, 100]".into(),
            });
        }
        if self.sync.pairs.is_empty() {
            errors.push(ValidationError {
                field: "sync.pairs".into(),
                message: "at least one pair is required".into(),
            });
        }
        for (i, pair) in self.sync.pairs.iter().enumerate() {
            if pair.source.as_os_str().is_empty() || pair.destination.as_os_str().is_empty() {
                errors.push(ValidationError {
                    field: format!("sync.pairs[{i}]"),
                    message: "source and destination must not be empty".into(),
                });
            } else if pair.source == pair.destination {
                errors.push(ValidationError {
                    field: format!("sync.pairs[{i}]"),
                    message: format!(
                        "source and destination are the same file: {}",
                        pair.source.display()
                    ),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.logging.max_size_mb == 0 {
            errors.push(ValidationError {
                field: "logging.max_size_mb".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from the defaults with an empty catalog section and no pairs;
/// callers must at least set the catalog and add a pair for
/// [`build_validated`](ConfigBuilder::build_validated) to succeed.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: Config {
                catalog: CatalogConfig {
                    url: String::new(),
                    api_key: String::new(),
                    request_timeout_secs: default_request_timeout_secs(),
                    page_size: default_page_size(),
                    playlist_lookup_limit: default_playlist_lookup_limit(),
                },
                sync: SyncConfig {
                    poll_interval: default_poll_interval(),
                    debounce_delay: default_debounce_delay(),
                    cache_refresh_interval: default_cache_refresh_interval(),
                    freeze_threshold_percent: default_freeze_threshold_percent(),
                    pairs: Vec::new(),
                },
                state: StateConfig::default(),
                logging: LoggingConfig::default(),
            },
        }
    }

    // -- catalog --

    pub fn catalog(mut self, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        self.config.catalog.url = url.into();
        self.config.catalog.api_key = api_key.into();
        self
    }

    pub fn catalog_page_size(mut self, n: u32) -> Self {
        self.config.catalog.page_size = n;
        self
    }

    // -- sync --

    pub fn sync_poll_interval(mut self, seconds: u64) -> Self {
        self.config.sync.poll_interval = seconds;
        self
    }

    pub fn sync_debounce_delay(mut self, seconds: u64) -> Self {
        self.config.sync.debounce_delay = seconds;
        self
    }

    pub fn sync_cache_refresh_interval(mut self, seconds: u64) -> Self {
        self.config.sync.cache_refresh_interval = seconds;
        self
    }

    pub fn sync_freeze_threshold_percent(mut self, percent: f64) -> Self {
        self.config.sync.freeze_threshold_percent = percent;
        self
    }

    pub fn pair(mut self, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        self.config
            .sync
            .pairs
            .push(PlaylistPair::new(source, destination));
        self
    }

    // -- state --

    pub fn state_dir(mut self, dir: &Path) -> Self {
        self.config.state.fingerprints = dir.join("fingerprints.json");
        self.config.state.identifier_cache = dir.join("item_ids.json");
        self
    }

    // -- logging --

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    /// Consume the builder and return the config without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the config or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
