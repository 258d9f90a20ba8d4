//! Integration tests for library discovery and audio item paging

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use plsync_core::domain::newtypes::ItemId;
use plsync_core::ports::ICatalogService;

use crate::common;

#[tokio::test]
async fn test_list_virtual_folders() {
    let (_server, catalog) = common::setup_jellyfin_mock().await;

    let folders = catalog
        .list_virtual_folders()
        .await
        .expect("list_virtual_folders failed");

    assert_eq!(folders.len(), 2);
    let music = folders
        .iter()
        .find(|f| f.collection_type.as_deref() == Some("music"))
        .expect("music library missing");
    assert_eq!(music.name, "Music");
    assert_eq!(music.item_id.as_ref().map(ItemId::as_str), Some("lib-music"));
}

#[tokio::test]
async fn test_list_audio_items_sends_paging_query() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(query_param("ParentId", "lib-music"))
        .and(query_param("IncludeItemTypes", "Audio"))
        .and(query_param("Recursive", "true"))
        .and(query_param("Fields", "Path"))
        .and(query_param("StartIndex", "2"))
        .and(query_param("Limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::items_body(
            &[("a3", "/music/C.flac"), ("a4", "/music/D.flac")],
            5,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let library: ItemId = "lib-music".parse().unwrap();
    let page = catalog
        .list_audio_items(&library, 2, 2)
        .await
        .expect("list_audio_items failed");

    assert_eq!(page.total_record_count, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id.as_str(), "a3");
    assert_eq!(page.items[1].path.as_deref(), Some("/music/D.flac"));
}

#[tokio::test]
async fn test_list_audio_items_drops_invalid_ids() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::items_body(
            &[("", "/music/broken.flac"), ("ok-1", "/music/fine.flac")],
            2,
        )))
        .mount(&server)
        .await;

    let library: ItemId = "lib-music".parse().unwrap();
    let page = catalog.list_audio_items(&library, 0, 1000).await.unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id.as_str(), "ok-1");
    assert_eq!(page.returned, 2);
}

#[tokio::test]
async fn test_unauthorized_is_an_error() {
    let server = wiremock::MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Library/VirtualFolders"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&server)
        .await;

    let client = plsync_jellyfin::client::JellyfinClient::new(
        server.uri(),
        "wrong",
        std::time::Duration::from_secs(5),
    )
    .unwrap();
    let catalog = plsync_jellyfin::provider::JellyfinCatalog::new(client);

    let err = catalog.list_virtual_folders().await.unwrap_err();
    let jellyfin_err = err
        .downcast_ref::<plsync_jellyfin::JellyfinError>()
        .expect("error should carry JellyfinError");
    assert!(matches!(
        jellyfin_err,
        plsync_jellyfin::JellyfinError::Unauthorized(body) if body == "bad token"
    ));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let library: ItemId = "lib-music".parse().unwrap();
    let err = catalog.list_audio_items(&library, 0, 10).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<plsync_jellyfin::JellyfinError>(),
        Some(plsync_jellyfin::JellyfinError::InvalidResponse(_))
    ));
}
