//! JellyfinCatalog - ICatalogService implementation for the Jellyfin API
//!
//! Wraps the [`JellyfinClient`] and maps its wire types to the port DTOs.
//!
//! ## Design Notes
//!
//! - Items whose id is not a valid [`ItemId`] are dropped with a warning;
//!   the sync core never sees them.
//! - The playlist listing is capped by `playlist_lookup_limit`, matching
//!   a single `Limit=` page.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use plsync_core::domain::newtypes::{ItemId, UserId};
use plsync_core::ports::catalog::{
    CatalogItem, ICatalogService, ItemPage, PlaylistEntry, ScheduledTask, VirtualFolder,
};

use crate::client::{ItemDto, JellyfinClient, TaskDto, VirtualFolderDto};

/// Default number of playlists requested per user lookup
pub const DEFAULT_PLAYLIST_LOOKUP_LIMIT: u32 = 200;

// ============================================================================
// Wire -> port mapping
// ============================================================================

fn parse_id(raw: &str, context: &str) -> Option<ItemId> {
    match raw.parse::<ItemId>() {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(id = raw, context, error = %e, "Skipping item with invalid id");
            None
        }
    }
}

fn folder_from_dto(dto: VirtualFolderDto) -> VirtualFolder {
    VirtualFolder {
        item_id: dto
            .item_id
            .as_deref()
            .and_then(|id| parse_id(id, "virtual folder")),
        name: dto.name,
        collection_type: dto.collection_type,
    }
}

fn item_from_dto(dto: ItemDto) -> Option<CatalogItem> {
    Some(CatalogItem {
        id: parse_id(&dto.id, "audio item")?,
        path: dto.path,
    })
}

fn playlist_from_dto(dto: ItemDto) -> Option<PlaylistEntry> {
    Some(PlaylistEntry {
        id: parse_id(&dto.id, "playlist")?,
        name: dto.name,
        path: dto.path,
    })
}

fn task_from_dto(dto: TaskDto) -> ScheduledTask {
    ScheduledTask {
        name: dto.name,
        key: dto.key,
        state: dto.state,
        progress_percent: dto.current_progress_percentage,
    }
}

// ============================================================================
// JellyfinCatalog
// ============================================================================

/// Catalog adapter backed by a Jellyfin server
#[derive(Debug, Clone)]
pub struct JellyfinCatalog {
    client: JellyfinClient,
    playlist_lookup_limit: u32,
}

impl JellyfinCatalog {
    /// Creates a new adapter around `client`
    pub fn new(client: JellyfinClient) -> Self {
        Self {
            client,
            playlist_lookup_limit: DEFAULT_PLAYLIST_LOOKUP_LIMIT,
        }
    }

    /// Overrides how many playlists are fetched per user lookup
    pub fn with_playlist_lookup_limit(mut self, limit: u32) -> Self {
        self.playlist_lookup_limit = limit;
        self
    }

    /// Returns the underlying client
    pub fn client(&self) -> &JellyfinClient {
        &self.client
    }
}

#[async_trait]
impl ICatalogService for JellyfinCatalog {
    async fn list_virtual_folders(&self) -> Result<Vec<VirtualFolder>> {
        let folders = self.client.virtual_folders().await?;
        Ok(folders.into_iter().map(folder_from_dto).collect())
    }

    async fn list_audio_items(
        &self,
        library: &ItemId,
        start_index: u64,
        limit: u32,
    ) -> Result<ItemPage> {
        let page = self
            .client
            .audio_items(library.as_str(), start_index, limit)
            .await?;
        let returned = page.items.len() as u64;
        let items: Vec<CatalogItem> = page.items.into_iter().filter_map(item_from_dto).collect();
        debug!(
            start_index,
            returned,
            kept = items.len(),
            total = page.total_record_count,
            "Fetched audio item page"
        );
        Ok(ItemPage {
            items,
            returned,
            total_record_count: page.total_record_count,
        })
    }

    async fn list_scheduled_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let tasks = self.client.scheduled_tasks().await?;
        Ok(tasks.into_iter().map(task_from_dto).collect())
    }

    async fn list_user_playlists(&self, owner: &UserId) -> Result<Vec<PlaylistEntry>> {
        let page = self
            .client
            .user_playlists(owner.as_str(), self.playlist_lookup_limit)
            .await?;
        Ok(page.items.into_iter().filter_map(playlist_from_dto).collect())
    }

    async fn append_playlist_items(
        &self,
        playlist: &ItemId,
        owner: &UserId,
        items: &[ItemId],
    ) -> Result<()> {
        let ids: Vec<&str> = items.iter().map(ItemId::as_str).collect();
        self.client
            .add_to_playlist(playlist.as_str(), &ids, owner.as_str())
            .await
    }

    async fn refresh_library(&self) -> Result<()> {
        self.client.refresh_library().await
    }
}
