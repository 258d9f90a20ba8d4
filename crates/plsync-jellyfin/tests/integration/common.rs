//! Shared test helpers for Jellyfin integration tests
//!
//! Provides wiremock-based mock server setup for the Jellyfin endpoints
//! plsync talks to. Each helper mounts the endpoints it needs and the
//! setup function returns a catalog pointing at the mock server.

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use plsync_jellyfin::client::JellyfinClient;
use plsync_jellyfin::provider::JellyfinCatalog;

pub const API_KEY: &str = "test-api-key";

/// Starts a mock server with the library listing mounted and returns
/// a (MockServer, JellyfinCatalog) tuple.
///
/// Pre-configured endpoints:
/// - GET /Library/VirtualFolders → one music library (`lib-music`) and one movie library
pub async fn setup_jellyfin_mock() -> (MockServer, JellyfinCatalog) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Library/VirtualFolders"))
        .and(header("X-Emby-Token", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"Name": "Movies", "CollectionType": "movies", "ItemId": "lib-movies"},
            {"Name": "Music", "CollectionType": "music", "ItemId": "lib-music"}
        ])))
        .mount(&server)
        .await;

    let client = JellyfinClient::new(server.uri(), API_KEY, Duration::from_secs(5))
        .expect("client construction failed");

    (server, JellyfinCatalog::new(client))
}

/// Builds an `Items` envelope from (id, path) pairs.
pub fn items_body(items: &[(&str, &str)], total: u64) -> serde_json::Value {
    let items: Vec<serde_json::Value> = items
        .iter()
        .map(|(id, p)| serde_json::json!({"Id": id, "Path": p, "Type": "Audio"}))
        .collect();
    serde_json::json!({
        "Items": items,
        "TotalRecordCount": total,
        "StartIndex": 0
    })
}

/// Mounts the scheduled task listing.
pub async fn mount_tasks(server: &MockServer, tasks: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/ScheduledTasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tasks))
        .mount(server)
        .await;
}
