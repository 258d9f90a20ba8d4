//! In-memory port implementations for unit tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use plsync_core::domain::errors::DocumentError;
use plsync_core::domain::newtypes::{Fingerprint, ItemId, TrackPath, UserId};
use plsync_core::domain::playlist::PlaylistDocument;
use plsync_core::ports::catalog::{
    CatalogItem, ICatalogService, ItemPage, PlaylistEntry, ScheduledTask, VirtualFolder,
};
use plsync_core::ports::clock::IClock;
use plsync_core::ports::playlist_store::IPlaylistStore;

use crate::document::fingerprint_of;

/// A fingerprint made of one repeated hex digit
pub fn fp(digit: char) -> Fingerprint {
    Fingerprint::new(std::iter::repeat(digit).take(Fingerprint::HEX_LEN).collect()).unwrap()
}

pub fn id(s: &str) -> ItemId {
    s.parse().unwrap()
}

pub fn user(s: &str) -> UserId {
    s.parse().unwrap()
}

pub fn tracks(paths: &[&str]) -> Vec<TrackPath> {
    paths.iter().map(|p| TrackPath::new(*p)).collect()
}

pub fn doc(owner: Option<&str>, title: Option<&str>, paths: &[&str]) -> PlaylistDocument {
    PlaylistDocument::build(owner, title, &tracks(paths))
}

// ============================================================================
// MockCatalog
// ============================================================================

/// A recorded catalog call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    ListFolders,
    ListItems { start: u64, limit: u32 },
    ListTasks,
    ListPlaylists(String),
    Append {
        playlist: String,
        owner: String,
        items: Vec<String>,
    },
    Refresh,
}

impl CatalogCall {
    pub fn is_mutating(&self) -> bool {
        matches!(self, CatalogCall::Append { .. } | CatalogCall::Refresh)
    }
}

#[derive(Default)]
pub struct MockCatalog {
    folders: Mutex<Vec<VirtualFolder>>,
    items: Mutex<Vec<CatalogItem>>,
    hidden: Mutex<HashSet<String>>,
    tasks: Mutex<Vec<ScheduledTask>>,
    playlists: Mutex<HashMap<String, Vec<PlaylistEntry>>>,
    fail_folders: Mutex<bool>,
    fail_items: Mutex<bool>,
    fail_tasks: Mutex<bool>,
    fail_append: Mutex<bool>,
    calls: Mutex<Vec<CatalogCall>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog with a music library `lib-music`
    pub fn with_music_library() -> Self {
        let catalog = Self::new();
        catalog.set_folders(vec![
            VirtualFolder {
                item_id: Some(id("lib-movies")),
                name: "Movies".into(),
                collection_type: Some("movies".into()),
            },
            VirtualFolder {
                item_id: Some(id("lib-music")),
                name: "Music".into(),
                collection_type: Some("Music".into()),
            },
        ]);
        catalog
    }

    pub fn set_folders(&self, folders: Vec<VirtualFolder>) {
        *self.folders.lock().unwrap() = folders;
    }

    /// Replaces the audio library with (id, path) entries
    pub fn set_items(&self, items: &[(&str, &str)]) {
        *self.items.lock().unwrap() = items
            .iter()
            .map(|(i, p)| CatalogItem {
                id: id(i),
                path: Some(p.to_string()),
            })
            .collect();
    }

    /// Counts `ids` in each page but leaves them out of the returned items,
    /// like an adapter dropping entries it cannot parse
    pub fn hide_items(&self, ids: &[&str]) {
        *self.hidden.lock().unwrap() = ids.iter().map(|i| i.to_string()).collect();
    }

    pub fn set_tasks(&self, tasks: Vec<ScheduledTask>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    /// Makes `owner` see one playlist
    pub fn add_playlist(&self, owner: &str, playlist_id: &str, name: &str, path: Option<&str>) {
        self.playlists
            .lock()
            .unwrap()
            .entry(owner.to_string())
            .or_default()
            .push(PlaylistEntry {
                id: id(playlist_id),
                name: Some(name.to_string()),
                path: path.map(str::to_string),
            });
    }

    pub fn fail_folder_listing(&self, fail: bool) {
        *self.fail_folders.lock().unwrap() = fail;
    }

    pub fn fail_item_listing(&self, fail: bool) {
        *self.fail_items.lock().unwrap() = fail;
    }

    pub fn fail_task_listing(&self, fail: bool) {
        *self.fail_tasks.lock().unwrap() = fail;
    }

    pub fn fail_appends(&self, fail: bool) {
        *self.fail_append.lock().unwrap() = fail;
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn mutating_calls(&self) -> Vec<CatalogCall> {
        self.calls().into_iter().filter(CatalogCall::is_mutating).collect()
    }

    pub fn refresh_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == CatalogCall::Refresh)
            .count()
    }

    fn record(&self, call: CatalogCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ICatalogService for MockCatalog {
    async fn list_virtual_folders(&self) -> Result<Vec<VirtualFolder>> {
        self.record(CatalogCall::ListFolders);
        if *self.fail_folders.lock().unwrap() {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.folders.lock().unwrap().clone())
    }

    async fn list_audio_items(
        &self,
        _library: &ItemId,
        start_index: u64,
        limit: u32,
    ) -> Result<ItemPage> {
        self.record(CatalogCall::ListItems {
            start: start_index,
            limit,
        });
        if *self.fail_items.lock().unwrap() {
            return Err(anyhow!("connection reset"));
        }
        let items = self.items.lock().unwrap();
        let hidden = self.hidden.lock().unwrap();
        let page: Vec<CatalogItem> = items
            .iter()
            .skip(start_index as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        let returned = page.len() as u64;
        Ok(ItemPage {
            items: page
                .into_iter()
                .filter(|item| !hidden.contains(item.id.as_str()))
                .collect(),
            returned,
            total_record_count: items.len() as u64,
        })
    }

    async fn list_scheduled_tasks(&self) -> Result<Vec<ScheduledTask>> {
        self.record(CatalogCall::ListTasks);
        if *self.fail_tasks.lock().unwrap() {
            return Err(anyhow!("timeout"));
        }
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn list_user_playlists(&self, owner: &UserId) -> Result<Vec<PlaylistEntry>> {
        self.record(CatalogCall::ListPlaylists(owner.to_string()));
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .get(owner.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn append_playlist_items(
        &self,
        playlist: &ItemId,
        owner: &UserId,
        items: &[ItemId],
    ) -> Result<()> {
        self.record(CatalogCall::Append {
            playlist: playlist.to_string(),
            owner: owner.to_string(),
            items: items.iter().map(ToString::to_string).collect(),
        });
        if *self.fail_append.lock().unwrap() {
            return Err(anyhow!("server error 500"));
        }
        Ok(())
    }

    async fn refresh_library(&self) -> Result<()> {
        self.record(CatalogCall::Refresh);
        Ok(())
    }
}

// ============================================================================
// MemoryPlaylistStore
// ============================================================================

#[derive(Default)]
pub struct MemoryPlaylistStore {
    documents: Mutex<HashMap<PathBuf, PlaylistDocument>>,
    fixed_fingerprints: Mutex<HashMap<PathBuf, Fingerprint>>,
    malformed: Mutex<HashSet<PathBuf>>,
    writes: Mutex<Vec<PathBuf>>,
}

impl MemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<PathBuf>, document: PlaylistDocument) {
        self.documents.lock().unwrap().insert(path.into(), document);
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<PlaylistDocument> {
        self.documents.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Pins the fingerprint reported for `path`, independent of content
    pub fn insert_fingerprint(&self, path: impl Into<PathBuf>, fingerprint: Fingerprint) {
        self.fixed_fingerprints
            .lock()
            .unwrap()
            .insert(path.into(), fingerprint);
    }

    /// Makes reads of `path` fail as unparsable
    pub fn set_malformed(&self, path: impl Into<PathBuf>, malformed: bool) {
        let path = path.into();
        let mut set = self.malformed.lock().unwrap();
        if malformed {
            set.insert(path);
        } else {
            set.remove(&path);
        }
    }

    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl IPlaylistStore for MemoryPlaylistStore {
    async fn read(&self, path: &Path) -> Result<PlaylistDocument, DocumentError> {
        if self.malformed.lock().unwrap().contains(path) {
            return Err(DocumentError::Malformed {
                path: path.to_path_buf(),
                reason: "truncated".into(),
            });
        }
        self.get(path).ok_or_else(|| DocumentError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
        })
    }

    async fn write(&self, path: &Path, document: &PlaylistDocument) -> Result<(), DocumentError> {
        self.writes.lock().unwrap().push(path.to_path_buf());
        self.put(path, document.clone());
        self.fixed_fingerprints.lock().unwrap().remove(path);
        Ok(())
    }

    async fn fingerprint(&self, path: &Path) -> Option<Fingerprint> {
        let fixed = self.fixed_fingerprints.lock().unwrap().get(path).cloned();
        if fixed.is_some() {
            return fixed;
        }
        let document = self.read(path).await.ok()?;
        fingerprint_of(&document).ok()
    }
}

// ============================================================================
// ManualClock
// ============================================================================

pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl IClock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}
