//! Identifier resolver
//!
//! Maps track paths, as written in playlist documents, to catalog item ids.
//! The mapping is built by paging through every audio item of the music
//! library and is cached on disk between runs.
//!
//! ## Rebuild modes
//!
//! - **Incremental**: only paths missing from the cache are added; existing
//!   entries are never touched.
//! - **Full rescan**: a fresh map is built and swapped in once every page
//!   has been fetched, dropping entries for tracks that disappeared.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use plsync_core::domain::newtypes::{ItemId, TrackPath};
use plsync_core::ports::catalog::ICatalogService;

use crate::state::PersistedMap;
use crate::SyncError;

/// Collection type of the library holding audio tracks
const MUSIC_COLLECTION: &str = "music";

/// Lowercased path -> item id cache backed by the catalog
pub struct IdentifierResolver {
    catalog: Arc<dyn ICatalogService>,
    cache: PersistedMap<ItemId>,
    library: Option<ItemId>,
    page_size: u32,
}

impl IdentifierResolver {
    /// Loads the cache from `cache_file`
    ///
    /// # Arguments
    /// * `catalog` - Catalog to page through on rebuild
    /// * `cache_file` - JSON file holding the cache
    /// * `page_size` - Items requested per page
    pub async fn load(
        catalog: Arc<dyn ICatalogService>,
        cache_file: impl Into<PathBuf>,
        page_size: u32,
    ) -> Self {
        let cache = PersistedMap::load(cache_file).await;
        info!(entries = cache.len(), "Loaded identifier cache");
        Self {
            catalog,
            cache,
            library: None,
            page_size: page_size.max(1),
        }
    }

    /// Finds the music library, remembering it for later rebuilds
    ///
    /// # Errors
    /// - [`SyncError::ConfigurationFatal`] if the catalog has no music library
    /// - [`SyncError::Catalog`] if the library listing failed
    pub async fn locate_library(&mut self) -> Result<ItemId, SyncError> {
        if let Some(library) = &self.library {
            return Ok(library.clone());
        }

        let folders = self
            .catalog
            .list_virtual_folders()
            .await
            .map_err(SyncError::Catalog)?;

        let music = folders
            .into_iter()
            .find(|f| {
                f.collection_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(MUSIC_COLLECTION))
            })
            .ok_or_else(|| {
                SyncError::ConfigurationFatal("catalog has no music library".to_string())
            })?;

        let library = music.item_id.ok_or_else(|| {
            SyncError::ConfigurationFatal(format!("music library '{}' has no id", music.name))
        })?;

        info!(library = %library, name = %music.name, "Located music library");
        self.library = Some(library.clone());
        Ok(library)
    }

    /// Re-reads the music library into the cache
    ///
    /// Returns the number of paths that were not cached before.
    ///
    /// # Errors
    /// Fails if the library cannot be located or any page fails to load;
    /// the cache is left unchanged in that case.
    pub async fn rebuild(&mut self, full_rescan: bool) -> Result<usize, SyncError> {
        let library = self.locate_library().await?;

        let mut fetched: BTreeMap<String, ItemId> = BTreeMap::new();
        let mut start: u64 = 0;
        loop {
            let page = self
                .catalog
                .list_audio_items(&library, start, self.page_size)
                .await
                .map_err(SyncError::Catalog)?;
            let count = page.returned;

            for item in page.items {
                let Some(path) = item.path else { continue };
                let key = TrackPath::new(path).cache_key();
                if full_rescan || !self.cache.contains_key(&key) {
                    fetched.entry(key).or_insert(item.id);
                }
            }

            start += count;
            debug!(fetched = start, total = page.total_record_count, "Paged audio items");
            if count == 0 || start >= page.total_record_count {
                break;
            }
        }

        let added = fetched
            .keys()
            .filter(|k| !self.cache.contains_key(k))
            .count();

        let changed = if full_rescan {
            let changed = &fetched != self.cache.entries();
            self.cache.replace_all(fetched);
            changed
        } else {
            for (key, id) in fetched {
                self.cache.insert(key, id);
            }
            added > 0
        };

        if changed {
            if let Err(e) = self.cache.persist().await {
                warn!(error = %format!("{e:#}"), "Failed to persist identifier cache");
            }
        }

        info!(
            full_rescan,
            added,
            entries = self.cache.len(),
            "Identifier cache rebuilt"
        );
        Ok(added)
    }

    /// Item id for `path`, matched case-insensitively
    pub fn lookup(&self, path: &TrackPath) -> Option<&ItemId> {
        self.cache.get(&path.cache_key())
    }

    /// Ids for `paths` in order; unknown paths are logged and omitted
    pub fn resolve_all(&self, paths: &[TrackPath]) -> Vec<ItemId> {
        paths
            .iter()
            .filter_map(|path| {
                let id = self.lookup(path);
                if id.is_none() {
                    warn!(path = %path, "Track not found in identifier cache");
                }
                id.cloned()
            })
            .collect()
    }

    /// The located music library, if any
    pub fn library(&self) -> Option<&ItemId> {
        self.library.as_ref()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
