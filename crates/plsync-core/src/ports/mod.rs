//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`ICatalogService`] - Media catalog operations (Jellyfin)
//! - [`IPlaylistStore`] - Playlist document read/write/fingerprint
//! - [`IClock`] - Monotonic time, injectable for tests

pub mod catalog;
pub mod clock;
pub mod playlist_store;

pub use catalog::{
    CatalogItem, ICatalogService, ItemPage, PlaylistEntry, ScheduledTask, VirtualFolder,
};
pub use clock::{IClock, SystemClock};
pub use playlist_store::IPlaylistStore;
