//! Integration tests for plsync-jellyfin
//!
//! Uses wiremock to simulate a Jellyfin server and verifies the
//! JellyfinClient endpoints and the JellyfinCatalog port adapter.

mod common;

mod test_items;
mod test_playlists;
mod test_tasks;
