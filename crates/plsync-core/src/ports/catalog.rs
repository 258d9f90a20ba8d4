//! Catalog service port (driven/secondary port)
//!
//! This module defines the interface for talking to the media catalog. The
//! primary implementation targets Jellyfin's HTTP API, but the sync core only
//! depends on the six operations below and their semantics, not on transport.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific;
//!   the sync core treats any failure as "no state change this tick".
//! - Uses `#[async_trait]` for async trait methods.
//! - The structs here are port-level DTOs; adapters map their wire formats to them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{ItemId, UserId};

// ============================================================================
// DTOs
// ============================================================================

/// One audio item from the catalog listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Catalog-internal id
    pub id: ItemId,
    /// On-disk path as the catalog knows it (absent for virtual items)
    pub path: Option<String>,
}

/// A page of the audio item listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemPage {
    /// Items on this page
    pub items: Vec<CatalogItem>,
    /// Entries the server sent for this page, including ones the adapter
    /// dropped; paging offsets advance by this count
    pub returned: u64,
    /// Total number of items across all pages
    pub total_record_count: u64,
}

/// A top-level library ("virtual folder")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFolder {
    /// Library id, used as `ParentId` for item listings
    pub item_id: Option<ItemId>,
    /// Display name
    pub name: String,
    /// Collection type (`music`, `movies`, ...), absent for mixed libraries
    pub collection_type: Option<String>,
}

/// A scheduled/background task and its live status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Display name, e.g. "Scan Media Library"
    pub name: String,
    /// Stable key, e.g. `RefreshLibrary`
    pub key: String,
    /// `Idle`, `Running` or `Cancelling`
    pub state: String,
    /// Completion percentage while running
    pub progress_percent: Option<f64>,
}

/// A playlist as listed for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Playlist id, the target of item appends
    pub id: ItemId,
    /// Display name
    pub name: Option<String>,
    /// Folder path of the playlist on disk
    pub path: Option<String>,
}

// ============================================================================
// ICatalogService trait
// ============================================================================

/// Port trait for the media catalog
#[async_trait]
pub trait ICatalogService: Send + Sync {
    /// Lists the catalog's libraries
    async fn list_virtual_folders(&self) -> anyhow::Result<Vec<VirtualFolder>>;

    /// Lists one page of audio items under `library`, recursively
    ///
    /// # Arguments
    /// * `library` - The library id used as parent
    /// * `start_index` - Offset of the first item
    /// * `limit` - Maximum number of items on the page
    async fn list_audio_items(
        &self,
        library: &ItemId,
        start_index: u64,
        limit: u32,
    ) -> anyhow::Result<ItemPage>;

    /// Lists scheduled tasks with their live state
    async fn list_scheduled_tasks(&self) -> anyhow::Result<Vec<ScheduledTask>>;

    /// Lists the playlists visible to `owner`
    async fn list_user_playlists(&self, owner: &UserId) -> anyhow::Result<Vec<PlaylistEntry>>;

    /// Appends items, in order, to the end of a playlist
    async fn append_playlist_items(
        &self,
        playlist: &ItemId,
        owner: &UserId,
        items: &[ItemId],
    ) -> anyhow::Result<()>;

    /// Asks the catalog to rescan its libraries
    async fn refresh_library(&self) -> anyhow::Result<()>;
}
