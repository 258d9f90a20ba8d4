//! Integration tests for scheduled task listing and library refresh

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use plsync_core::ports::ICatalogService;

use crate::common;

#[tokio::test]
async fn test_list_scheduled_tasks() {
    let (server, catalog) = common::setup_jellyfin_mock().await;
    common::mount_tasks(
        &server,
        serde_json::json!([
            {"Name": "Scan Media Library", "Key": "RefreshLibrary", "State": "Running", "CurrentProgressPercentage": 33.3},
            {"Name": "Clean Cache", "Key": "DeleteCacheFiles", "State": "Idle"}
        ]),
    )
    .await;

    let tasks = catalog
        .list_scheduled_tasks()
        .await
        .expect("list_scheduled_tasks failed");

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].key, "RefreshLibrary");
    assert_eq!(tasks[0].progress_percent, Some(33.3));
    assert_eq!(tasks[1].state, "Idle");
    assert!(tasks[1].progress_percent.is_none());
}

#[tokio::test]
async fn test_refresh_library_posts_with_token() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("POST"))
        .and(path("/Library/Refresh"))
        .and(header("X-Emby-Token", common::API_KEY))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    catalog
        .refresh_library()
        .await
        .expect("refresh_library failed");
}

#[tokio::test]
async fn test_refresh_library_server_error() {
    let (server, catalog) = common::setup_jellyfin_mock().await;

    Mock::given(method("POST"))
        .and(path("/Library/Refresh"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = catalog.refresh_library().await.unwrap_err();
    let jellyfin_err = err
        .downcast_ref::<plsync_jellyfin::JellyfinError>()
        .expect("error should carry JellyfinError");
    assert!(jellyfin_err.is_transient());
}
