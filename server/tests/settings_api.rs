//! Settings endpoints, driven through the route handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use medley_library::{
    LibraryError, MemoryCatalog, MemorySettingsStore, RebuildOrchestrator, RebuildPipeline,
    RootDirSettings, RootDirectory, SettingsStore,
};
use medley_server::routes::{self, AppState};
use medley_server::{App, ServerConfig, SettingsHandler};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Accepts reads but fails every write.
struct ReadOnlyStore {
    inner: MemorySettingsStore,
}

#[async_trait]
impl SettingsStore for ReadOnlyStore {
    async fn root_dirs(&self) -> medley_library::Result<Vec<RootDirectory>> {
        self.inner.root_dirs().await
    }

    async fn add_root_dirs(&self, _dirs: &[RootDirectory]) -> medley_library::Result<()> {
        Err(LibraryError::Persistence("read-only file system".to_string()))
    }

    async fn remove_root_dirs(&self, _dirs: &[RootDirectory]) -> medley_library::Result<()> {
        Err(LibraryError::Persistence("read-only file system".to_string()))
    }
}

/// Removes fine but cannot add.
struct DiskFullStore {
    inner: MemorySettingsStore,
}

#[async_trait]
impl SettingsStore for DiskFullStore {
    async fn root_dirs(&self) -> medley_library::Result<Vec<RootDirectory>> {
        self.inner.root_dirs().await
    }

    async fn add_root_dirs(&self, _dirs: &[RootDirectory]) -> medley_library::Result<()> {
        Err(LibraryError::Persistence("disk full".to_string()))
    }

    async fn remove_root_dirs(&self, dirs: &[RootDirectory]) -> medley_library::Result<()> {
        self.inner.remove_root_dirs(dirs).await
    }
}

fn handler_with_store(store: Arc<dyn SettingsStore>, home: &TempDir) -> AppState {
    let settings = Arc::new(RootDirSettings::new(store));
    let catalog = Arc::new(MemoryCatalog::new());
    let pipeline = RebuildPipeline::new(settings.clone(), catalog.clone(), home.path());
    let orchestrator = Arc::new(RebuildOrchestrator::spawn(pipeline));
    Arc::new(SettingsHandler::new(settings, orchestrator, catalog))
}

fn handler(home: &TempDir) -> AppState {
    handler_with_store(Arc::new(MemorySettingsStore::new()), home)
}

async fn read(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_dirs(handler: &AppState, body: Value) -> (StatusCode, Value) {
    let body = Bytes::from(serde_json::to_vec(&body).unwrap());
    read(
        routes::add_root_dirs(State(handler.clone()), body)
            .await
            .into_response(),
    )
    .await
}

async fn get_dirs(handler: &AppState) -> Value {
    let (status, body) = read(
        routes::get_root_dirs(State(handler.clone()))
            .await
            .into_response(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

/// Ticket a manual rebuild gets; one more than the number of earlier triggers.
async fn next_ticket(handler: &AppState) -> u64 {
    let (status, body) = read(routes::rebuild(State(handler.clone())).await.into_response()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    body["ticket"].as_u64().unwrap()
}

#[tokio::test]
async fn test_add_root_dirs_returns_final_set() {
    let home = TempDir::new().unwrap();
    let handler = handler(&home);

    let (status, body) = post_dirs(
        &handler,
        json!({ "new_dirs": ["/music/rock", "/music/jazz"], "removed": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "root_dirs": ["/music/rock", "/music/jazz"] }));

    let (status, body) =
        post_dirs(&handler, json!({ "new_dirs": ["/music/"], "removed": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "root_dirs": ["/music"] }));

    assert_eq!(get_dirs(&handler).await, json!({ "dirs": ["/music"] }));
}

#[tokio::test]
async fn test_home_selection_and_not_changed() {
    let home = TempDir::new().unwrap();
    let handler = handler(&home);

    post_dirs(&handler, json!({ "new_dirs": ["/music"], "removed": [] })).await;

    let (status, body) =
        post_dirs(&handler, json!({ "new_dirs": ["$home"], "removed": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "root_dirs": ["$home"] }));
    assert_eq!(get_dirs(&handler).await, json!({ "dirs": ["$home"] }));

    let (status, body) =
        post_dirs(&handler, json!({ "new_dirs": [" $home "], "removed": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "msg": "Not changed!" }));

    assert_eq!(next_ticket(&handler).await, 3);
}

#[tokio::test]
async fn test_malformed_requests_are_rejected_without_rebuild() {
    let home = TempDir::new().unwrap();
    let handler = handler(&home);

    let bodies = [
        json!({ "new_dirs": ["/music"] }),
        json!({ "removed": [] }),
        json!({ "new_dirs": "/music", "removed": [] }),
        json!(null),
        json!([]),
    ];
    for body in bodies {
        let (status, reply) = post_dirs(&handler, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, json!({ "msg": "Failed! No directories were given." }));
    }

    let garbage = read(
        routes::add_root_dirs(State(handler.clone()), Bytes::from_static(b"not json"))
            .await
            .into_response(),
    )
    .await;
    assert_eq!(garbage.0, StatusCode::BAD_REQUEST);

    assert_eq!(get_dirs(&handler).await, json!({ "dirs": [] }));
    assert_eq!(next_ticket(&handler).await, 1);
}

#[tokio::test]
async fn test_persistence_failure_is_a_server_error() {
    let home = TempDir::new().unwrap();
    let store = Arc::new(ReadOnlyStore {
        inner: MemorySettingsStore::with_dirs(vec![RootDirectory::path("/music")]),
    });
    let handler = handler_with_store(store, &home);

    let (status, body) =
        post_dirs(&handler, json!({ "new_dirs": ["/podcasts"], "removed": ["/music"] })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["msg"].as_str().unwrap().contains("read-only file system"));

    assert_eq!(get_dirs(&handler).await, json!({ "dirs": ["/music"] }));
    assert_eq!(next_ticket(&handler).await, 1);
}

#[tokio::test]
async fn test_failed_add_keeps_previous_roots() {
    let home = TempDir::new().unwrap();
    let store = Arc::new(DiskFullStore {
        inner: MemorySettingsStore::with_dirs(vec![RootDirectory::path("/a")]),
    });
    let handler = handler_with_store(store, &home);

    let (status, body) =
        post_dirs(&handler, json!({ "new_dirs": ["/b"], "removed": ["/a"] })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["msg"].as_str().unwrap().contains("disk full"));

    assert_eq!(get_dirs(&handler).await, json!({ "dirs": ["/a"] }));
    assert_eq!(next_ticket(&handler).await, 1);
}

#[tokio::test]
async fn test_relative_entries_are_rejected() {
    let home = TempDir::new().unwrap();
    let handler = handler(&home);

    let (status, _) = post_dirs(&handler, json!({ "new_dirs": ["music"], "removed": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        post_dirs(&handler, json!({ "new_dirs": ["$home/"], "removed": [] })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "root_dirs": ["$home"] }));
    assert_eq!(next_ticket(&handler).await, 2);
}

#[tokio::test]
async fn test_rebuild_and_stats() {
    let home = TempDir::new().unwrap();
    let album = home.path().join("Music/Artist/Album");
    std::fs::create_dir_all(&album).unwrap();
    std::fs::File::create(album.join("01 Song.ogg")).unwrap();
    let handler = handler(&home);

    post_dirs(&handler, json!({ "new_dirs": ["$home"], "removed": [] })).await;
    let ticket = next_ticket(&handler).await;
    handler.orchestrator().wait_for(ticket).await.unwrap();

    let Json(stats) = routes::stats(State(handler.clone())).await;
    let stats = serde_json::to_value(stats).unwrap();
    assert_eq!(
        stats["catalog"],
        json!({ "tracks": 1, "folders": 4, "albums": 1, "artists": 1 })
    );
    assert_eq!(stats["rebuild"]["running"], json!(false));
    assert_eq!(stats["rebuild"]["processed"], json!(ticket));
}

#[tokio::test]
async fn test_app_start_builds_persisted_roots() {
    let data = TempDir::new().unwrap();
    let home = TempDir::new().unwrap();
    let album = home.path().join("Artist/Album");
    std::fs::create_dir_all(&album).unwrap();
    std::fs::File::create(album.join("song.mp3")).unwrap();
    std::fs::write(
        data.path().join("settings.json"),
        r#"{ "root_dirs": ["$home"] }"#,
    )
    .unwrap();

    let config = ServerConfig {
        data_dir: data.path().to_path_buf(),
        home_dir: home.path().to_path_buf(),
        watch_mode: medley_directory_watcher::WatchMode::Manual,
        ..ServerConfig::default()
    };
    let app = App::start(&config).await.unwrap();
    let handler = app.handler();

    let report = handler.orchestrator().wait_for(1).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(handler.catalog().stats().await.tracks, 1);
    assert_eq!(get_dirs(&handler).await, json!({ "dirs": ["$home"] }));
}
