//! Persisted key/value state
//!
//! Both the fingerprint table and the identifier cache are flat JSON objects
//! on disk. [`PersistedMap`] loads them at startup and rewrites them
//! atomically (temp file + rename) whenever the caller persists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

fn decode_entries<V: DeserializeOwned>(
    path: &Path,
    raw: BTreeMap<String, serde_json::Value>,
) -> BTreeMap<String, V> {
    raw.into_iter()
        .filter_map(|(key, value)| match serde_json::from_value::<V>(value) {
            Ok(value) => Some((key, value)),
            Err(e) => {
                warn!(path = %path.display(), key = %key, error = %e, "Dropping invalid state entry");
                None
            }
        })
        .collect()
}

/// A string-keyed map mirrored to a JSON file
#[derive(Debug, Clone)]
pub struct PersistedMap<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
}

impl<V> PersistedMap<V>
where
    V: Serialize + DeserializeOwned,
{
    /// Creates an empty map bound to `path` without touching the disk
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads the map from `path`
    ///
    /// A missing file yields an empty map. An unreadable file, or one that
    /// is not a JSON object, is logged and also yields an empty map; it is
    /// overwritten on the next persist. Individual values that do not
    /// decode are dropped and the rest are kept.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, serde_json::Value>>(&bytes) {
                Ok(raw) => decode_entries(&path, raw),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "State file is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read state file, starting empty");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "Loaded state file");
        Self { path, entries }
    }

    /// Writes the map to disk atomically
    ///
    /// # Errors
    /// Fails if the parent directory cannot be created or the file cannot
    /// be written or renamed into place.
    pub async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_vec_pretty(&self.entries).context("Failed to serialize state")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Persisted state file");
        Ok(())
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts in memory only; returns the previous value
    pub fn insert(&mut self, key: String, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Replaces every entry in memory only
    pub fn replace_all(&mut self, entries: BTreeMap<String, V>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &BTreeMap<String, V> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
