//! Jellyfin HTTP API client
//!
//! Provides a typed HTTP client for the Jellyfin endpoints plsync uses.
//! Handles the `X-Emby-Token` header, request timeouts, status mapping
//! and JSON deserialization.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use plsync_jellyfin::client::JellyfinClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = JellyfinClient::new("http://jellyfin:8096", "api-key", Duration::from_secs(15))?;
//! for folder in client.virtual_folders().await? {
//!     println!("{} ({:?})", folder.name, folder.collection_type);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::JellyfinError;

/// Header carrying the API key
const TOKEN_HEADER: &str = "X-Emby-Token";

// ============================================================================
// Jellyfin API response types
// ============================================================================

/// Entry of `GET /Library/VirtualFolders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualFolderDto {
    /// Library name
    #[serde(default)]
    pub name: String,
    /// `music`, `movies`, ... (absent for mixed content)
    pub collection_type: Option<String>,
    /// Library id
    pub item_id: Option<String>,
}

/// An item as returned by the `/Items` family of endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDto {
    /// Item id
    pub id: String,
    /// Display name
    pub name: Option<String>,
    /// Path on the server's filesystem (requested via `Fields=Path`)
    pub path: Option<String>,
}

/// Envelope of `/Items` responses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    /// Items on this page
    #[serde(default)]
    pub items: Vec<ItemDto>,
    /// Total matching items across all pages
    #[serde(default)]
    pub total_record_count: u64,
}

/// Entry of `GET /ScheduledTasks`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskDto {
    /// Display name, e.g. "Scan Media Library"
    #[serde(default)]
    pub name: String,
    /// Stable key, e.g. `RefreshLibrary`
    #[serde(default)]
    pub key: String,
    /// `Idle`, `Running` or `Cancelling`
    #[serde(default)]
    pub state: String,
    /// Completion percentage while running
    pub current_progress_percentage: Option<f64>,
}

// ============================================================================
// JellyfinClient
// ============================================================================

/// HTTP client for the Jellyfin API
///
/// Wraps `reqwest::Client` with the API key header, a per-request timeout
/// and base URL construction.
#[derive(Debug, Clone)]
pub struct JellyfinClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// API key sent with every request
    api_key: String,
}

impl JellyfinClient {
    /// Creates a new client
    ///
    /// # Arguments
    /// * `base_url` - Server URL, e.g. `http://jellyfin:8096`
    /// * `api_key` - API key created in the Jellyfin dashboard
    /// * `timeout` - Upper bound for each request
    ///
    /// # Errors
    /// Fails if the TLS backend cannot be initialized
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g., "/ScheduledTasks")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .header(TOKEN_HEADER, &self.api_key)
    }

    /// Sends a request and maps non-success statuses to [`JellyfinError`]
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(JellyfinError::from)
            .with_context(|| format!("Failed to send {what} request"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(JellyfinError::from_status(status, body))
            .with_context(|| format!("{what} returned error status {status}"))
    }

    /// Sends a request and deserializes the JSON body
    async fn get_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = self.send(builder, what).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(JellyfinError::from)
            .with_context(|| format!("Failed to read {what} response"))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| JellyfinError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse {what} response"))
    }

    /// Lists the server's libraries
    ///
    /// `GET /Library/VirtualFolders`
    pub async fn virtual_folders(&self) -> Result<Vec<VirtualFolderDto>> {
        debug!("Fetching virtual folders");
        self.get_json(
            self.request(Method::GET, "/Library/VirtualFolders"),
            "GET /Library/VirtualFolders",
        )
        .await
    }

    /// Lists one page of audio items under a library
    ///
    /// `GET /Items?ParentId=..&IncludeItemTypes=Audio&Recursive=true&Fields=Path&StartIndex=..&Limit=..`
    pub async fn audio_items(
        &self,
        parent_id: &str,
        start_index: u64,
        limit: u32,
    ) -> Result<ItemsResponse> {
        debug!(parent_id, start_index, limit, "Fetching audio items");
        let builder = self.request(Method::GET, "/Items").query(&[
            ("ParentId", parent_id.to_string()),
            ("IncludeItemTypes", "Audio".to_string()),
            ("Recursive", "true".to_string()),
            ("Fields", "Path".to_string()),
            ("StartIndex", start_index.to_string()),
            ("Limit", limit.to_string()),
        ]);
        self.get_json(builder, "GET /Items").await
    }

    /// Lists scheduled tasks with their live state
    ///
    /// `GET /ScheduledTasks`
    pub async fn scheduled_tasks(&self) -> Result<Vec<TaskDto>> {
        self.get_json(
            self.request(Method::GET, "/ScheduledTasks"),
            "GET /ScheduledTasks",
        )
        .await
    }

    /// Lists the playlists visible to a user
    ///
    /// `GET /Users/{user}/Items?IncludeItemTypes=Playlist&Recursive=true&Fields=Path,Name,Id&Limit=..`
    pub async fn user_playlists(&self, user_id: &str, limit: u32) -> Result<ItemsResponse> {
        debug!(user_id, limit, "Fetching user playlists");
        let path = format!("/Users/{user_id}/Items");
        let builder = self.request(Method::GET, &path).query(&[
            ("IncludeItemTypes", "Playlist".to_string()),
            ("Recursive", "true".to_string()),
            ("Fields", "Path,Name,Id".to_string()),
            ("Limit", limit.to_string()),
        ]);
        self.get_json(builder, "GET /Users/{id}/Items").await
    }

    /// Appends items to the end of a playlist
    ///
    /// `POST /Playlists/{playlist}/Items?Ids=a,b&UserId=..`
    pub async fn add_to_playlist(
        &self,
        playlist_id: &str,
        item_ids: &[&str],
        user_id: &str,
    ) -> Result<()> {
        let path = format!("/Playlists/{playlist_id}/Items");
        debug!(playlist_id, count = item_ids.len(), "Appending playlist items");
        let builder = self
            .request(Method::POST, &path)
            .query(&[("Ids", item_ids.join(",")), ("UserId", user_id.to_string())]);
        self.send(builder, "POST /Playlists/{id}/Items").await?;
        Ok(())
    }

    /// Starts a library scan
    ///
    /// `POST /Library/Refresh`
    pub async fn refresh_library(&self) -> Result<()> {
        self.send(
            self.request(Method::POST, "/Library/Refresh"),
            "POST /Library/Refresh",
        )
        .await?;
        Ok(())
    }
}
