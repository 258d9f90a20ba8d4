//! plsync Jellyfin - catalog client
//!
//! Provides an async client for the parts of the Jellyfin HTTP API the
//! playlist synchronizer needs:
//! - Library (virtual folder) discovery and paginated audio item listing
//! - Scheduled task status, used to detect running library scans
//! - Playlist lookup per user and item appends
//! - Library refresh requests
//!
//! ## Modules
//!
//! - [`client`] - Jellyfin HTTP client and wire types
//! - [`provider`] - [`ICatalogService`](plsync_core::ports::ICatalogService) adapter

pub mod client;
pub mod provider;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when communicating with the Jellyfin API
#[derive(Debug, Error)]
pub enum JellyfinError {
    /// The API key is missing, invalid or revoked
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The API key lacks permission for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {body}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// Any other unexpected status
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// A network-level error occurred (connect, timeout, TLS)
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl JellyfinError {
    /// Maps a non-success HTTP status to an error
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => JellyfinError::Unauthorized(body),
            StatusCode::FORBIDDEN => JellyfinError::Forbidden(body),
            StatusCode::NOT_FOUND => JellyfinError::NotFound(body),
            s if s.is_server_error() => JellyfinError::ServerError {
                status: s.as_u16(),
                body,
            },
            s => JellyfinError::UnexpectedStatus {
                status: s.as_u16(),
                body,
            },
        }
    }

    /// Whether retrying on a later tick could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JellyfinError::ServerError { .. } | JellyfinError::NetworkError(_)
        )
    }
}
