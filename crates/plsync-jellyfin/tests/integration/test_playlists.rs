//! Integration tests for playlist lookup and item appends

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use plsync_core::domain::newtypes::{ItemId, UserId};
use plsync_core::ports::ICatalogService;

use crate::common;

#[tokio::test]
async fn test_list_user_playlists() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items"))
        .and(query_param("IncludeItemTypes", "Playlist"))
        .and(query_param("Recursive", "true"))
        .and(query_param("Fields", "Path,Name,Id"))
        .and(query_param("Limit", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Items": [
                {"Id": "pl-1", "Name": "Morning", "Path": "/data/playlists/Morning"},
                {"Id": "pl-2", "Name": "Evening"}
            ],
            "TotalRecordCount": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let owner: UserId = "user-1".parse().unwrap();
    let playlists = catalog
        .list_user_playlists(&owner)
        .await
        .expect("list_user_playlists failed");

    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[0].path.as_deref(), Some("/data/playlists/Morning"));
    assert_eq!(playlists[1].name.as_deref(), Some("Evening"));
    assert!(playlists[1].path.is_none());
}

#[tokio::test]
async fn test_append_playlist_items_joins_ids_in_order() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("POST"))
        .and(path("/Playlists/pl-1/Items"))
        .and(query_param("Ids", "a2,a1,a3"))
        .and(query_param("UserId", "user-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let playlist: ItemId = "pl-1".parse().unwrap();
    let owner: UserId = "user-1".parse().unwrap();
    let items: Vec<ItemId> = ["a2", "a1", "a3"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();

    catalog
        .append_playlist_items(&playlist, &owner, &items)
        .await
        .expect("append_playlist_items failed");
}

#[tokio::test]
async fn test_append_to_missing_playlist_fails() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("POST"))
        .and(path("/Playlists/gone/Items"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let playlist: ItemId = "gone".parse().unwrap();
    let owner: UserId = "user-1".parse().unwrap();
    let items: Vec<ItemId> = vec!["a1".parse().unwrap()];

    let err = catalog
        .append_playlist_items(&playlist, &owner, &items)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<plsync_jellyfin::JellyfinError>(),
        Some(plsync_jellyfin::JellyfinError::NotFound(_))
    ));
}
