//! Integration tests for tagscan-server API endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Scan ingestion and background resolution
//! - Item catalogue CRUD, tag binding and listing fallbacks
//! - Play log listing with dangling item references
//! - Pending-tag inspection and manual clear

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagscan_common::{
    open_store, Error, Item, ItemSort, LogEntry, Result, SortOrder, Store, StoreBackend,
};
use tagscan_server::notify::Notifier;
use tagscan_server::scan::{ResolverOptions, ScanResolver};
use tagscan_server::{build_router, AppState};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

struct TestApp {
    router: axum::Router,
    store: Arc<dyn Store>,
    resolver: Arc<ScanResolver>,
    notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

impl TestApp {
    async fn request(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Test helper: App over a fresh on-disk store (auth disabled)
async fn setup_app(backend: StoreBackend) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, dir.path()).await.unwrap();
    setup_app_over(store, dir)
}

fn setup_app_over(store: Arc<dyn Store>, dir: TempDir) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    let resolver = Arc::new(ScanResolver::new(
        Arc::clone(&store),
        notifier.clone(),
        ResolverOptions {
            base_url: Some("http://scanner.local".to_string()),
            ..Default::default()
        },
    ));

    let state = AppState::new(Arc::clone(&store), Arc::clone(&resolver), None);
    TestApp {
        router: build_router(state),
        store,
        resolver,
        notifier,
        _dir: dir,
    }
}

/// Test helper: Create request without body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create request with JSON body
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: POST a raw scan
fn scan_request(tag: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tag")
        .header("content-type", "text/plain")
        .body(Body::from(tag.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

async fn create_item(app: &TestApp, body: Value) -> Value {
    let response = app.request(json_request("POST", "/api/items", body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_json(response.into_body()).await
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app.request(test_request("GET", "/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tagscan-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_buildinfo_endpoint() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app.request(test_request("GET", "/api/buildinfo")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let git_hash = body["git_hash"].as_str().unwrap();
    assert!(git_hash == "unknown" || git_hash.len() >= 8, "{}", git_hash);
    // RFC 3339 in UTC, whole seconds
    let timestamp = body["build_timestamp"].as_str().unwrap();
    assert_eq!(timestamp.len(), "2024-01-01T00:00:00Z".len(), "{}", timestamp);
    assert!(timestamp.ends_with('Z'));
    assert!(body["build_profile"].is_string());
}

// =============================================================================
// Scan Ingestion Tests
// =============================================================================

#[tokio::test]
async fn test_scan_returns_ok_with_empty_body() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app.request(scan_request("  X9\n")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_bytes(response.into_body()).await.is_empty());

    app.resolver.wait_idle().await;
    // Surrounding whitespace is not part of the tag
    assert_eq!(app.resolver.pending_tag().as_deref(), Some("X9"));
}

#[tokio::test]
async fn test_scan_empty_tag_rejected() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app.request(scan_request(" \r\n")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.resolver.wait_idle().await;
    assert!(app.notifier.messages().is_empty());
}

#[tokio::test]
async fn test_scan_known_tag_logs_play() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let created = create_item(
        &app,
        json!({"name": "Blue Train", "artist": "John Coltrane", "tag": "A1"}),
    )
    .await;

    app.request(scan_request("A1")).await;
    app.resolver.wait_idle().await;

    let response = app.request(test_request("GET", "/api/logs")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["item_id"], created["item"]["id"]);
    assert_eq!(body["entries"][0]["item"]["name"], "Blue Train");
    assert_eq!(
        app.notifier.messages(),
        vec!["Scanned \"Blue Train\" by John Coltrane".to_string()]
    );
}

#[tokio::test]
async fn test_back_to_back_scans_log_once() {
    let app = setup_app(StoreBackend::Sqlite).await;
    create_item(&app, json!({"name": "Blue Train", "artist": "John Coltrane", "tag": "A1"})).await;
    create_item(&app, json!({"name": "Nefertiti", "artist": "Miles Davis", "tag": "B2"})).await;

    for _ in 0..2 {
        let response = app.request(scan_request("A1")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    app.resolver.wait_idle().await;

    assert_eq!(app.store.count_logs().await.unwrap(), 1);
    assert_eq!(app.notifier.messages().len(), 1);

    for tag in ["B2", "A1"] {
        app.request(scan_request(tag)).await;
    }
    app.resolver.wait_idle().await;

    assert_eq!(app.store.count_logs().await.unwrap(), 3);
    assert_eq!(app.notifier.messages().len(), 3);
}

#[tokio::test]
async fn test_unknown_scan_then_bind_clears_pending() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let created = create_item(&app, json!({"name": "Kind of Blue", "artist": "Miles Davis"})).await;
    let id = created["item"]["id"].as_u64().unwrap();

    app.request(scan_request("X9")).await;
    app.resolver.wait_idle().await;

    let messages = app.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Unknown tag scanned"));
    assert!(messages[0].contains("http://scanner.local/items/new?tag=X9&log=true"));

    let response = app.request(test_request("GET", "/api/pending-tag")).await;
    assert_eq!(extract_json(response.into_body()).await, json!({"tag": "X9"}));

    // Binding a different tag leaves the pending one alone
    let response = app
        .request(json_request("POST", &format!("/api/items/{}/tag", id), json!({"tag": "Y7"})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.resolver.pending_tag().as_deref(), Some("X9"));

    let response = app
        .request(json_request("POST", &format!("/api/items/{}/tag", id), json!({"tag": "X9"})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["tag"], "X9");

    let response = app.request(test_request("GET", "/api/pending-tag")).await;
    assert_eq!(extract_json(response.into_body()).await, json!({"tag": null}));
}

#[tokio::test]
async fn test_create_from_unknown_scan_link_logs_and_clears() {
    let app = setup_app(StoreBackend::Sqlite).await;

    app.request(scan_request("NEW1")).await;
    app.resolver.wait_idle().await;
    assert_eq!(app.resolver.pending_tag().as_deref(), Some("NEW1"));

    let created = create_item(
        &app,
        json!({"name": " Abbey Road ", "artist": "The Beatles", "tag": "NEW1", "log": true}),
    )
    .await;

    assert_eq!(created["item"]["name"], "Abbey Road");
    assert_eq!(created["log_entry"]["item_id"], created["item"]["id"]);
    assert_eq!(app.store.count_logs().await.unwrap(), 1);
    assert_eq!(app.resolver.pending_tag(), None);
}

#[tokio::test]
async fn test_clear_pending_tag() {
    let app = setup_app(StoreBackend::Sqlite).await;

    app.request(scan_request("X9")).await;
    app.resolver.wait_idle().await;

    let response = app.request(test_request("DELETE", "/api/pending-tag")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.resolver.pending_tag(), None);
}

// =============================================================================
// Item Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_item_crud() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let created = create_item(&app, json!({"name": "Ok Computer", "artist": "Radiohead"})).await;
    let id = created["item"]["id"].as_u64().unwrap();
    assert!(id > 0);
    assert!(created["log_entry"].is_null());

    let response = app.request(test_request("GET", &format!("/api/items/{}", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["artist"], "Radiohead");

    let response = app
        .request(json_request(
            "PUT",
            &format!("/api/items/{}", id),
            json!({"name": "OK Computer", "artist": "Radiohead", "tag": "R1"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["name"], "OK Computer");
    assert_eq!(body["tag"], "R1");

    let response = app.request(test_request("DELETE", &format!("/api/items/{}", id))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(test_request("GET", &format!("/api/items/{}", id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(extract_json(response.into_body()).await["error"].is_string());
}

#[tokio::test]
async fn test_delete_missing_item_succeeds() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app.request(test_request("DELETE", "/api/items/4242")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(test_request("DELETE", "/api/logs/4242")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_update_missing_item_not_found() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app
        .request(json_request(
            "PUT",
            "/api/items/77",
            json!({"name": "Ghost", "artist": "Nobody"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ids_beyond_storable_range_not_found() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let created = create_item(&app, json!({"name": "Only", "artist": "A", "tag": "T1"})).await;

    let huge = u64::MAX;
    let response = app.request(test_request("GET", &format!("/api/items/{}", huge))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(json_request(
            "PUT",
            &format!("/api/items/{}", huge),
            json!({"name": "Clobber", "artist": "B"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(json_request("POST", &format!("/api/items/{}/tag", huge), json!({"tag": "T2"})))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.request(test_request("GET", &format!("/api/logs/{}", huge))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let id = created["item"]["id"].as_u64().unwrap();
    let item = app.store.get_item(id).await.unwrap();
    assert_eq!(item.name, "Only");
    assert_eq!(item.tag.as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_bind_tag_keeps_other_fields_and_rejects_taken_tag() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let first = create_item(&app, json!({"name": "First", "artist": "A", "tag": "OLD"})).await;
    create_item(&app, json!({"name": "Second", "artist": "B", "tag": "TAKEN"})).await;
    let id = first["item"]["id"].as_u64().unwrap();

    let response = app
        .request(json_request("POST", &format!("/api/items/{}/tag", id), json!({"tag": "TAKEN"})))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(json_request("POST", &format!("/api/items/{}/tag", id), json!({"tag": " NEW "})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({"id": id, "name": "First", "artist": "A", "tag": "NEW"}));
    assert!(app.store.get_item_by_tag("OLD").await.unwrap_err().is_not_found());

    let response = app
        .request(json_request("POST", "/api/items/9999/tag", json!({"tag": "FREE"})))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_tag_conflict() {
    let app = setup_app(StoreBackend::Sqlite).await;
    create_item(&app, json!({"name": "First", "artist": "A", "tag": "DUP"})).await;

    let response = app
        .request(json_request(
            "POST",
            "/api/items",
            json!({"name": "Second", "artist": "B", "tag": "DUP"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("DUP"));

    assert_eq!(app.store.count_items().await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_blank_name_rejected() {
    let app = setup_app(StoreBackend::Sqlite).await;

    let response = app
        .request(json_request("POST", "/api/items", json!({"name": "   ", "artist": "X"})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bind_empty_tag_rejected() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let created = create_item(&app, json!({"name": "N", "artist": "A"})).await;
    let id = created["item"]["id"].as_u64().unwrap();

    let response = app
        .request(json_request("POST", &format!("/api/items/{}/tag", id), json!({"tag": " "})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_items_falls_back_on_unknown_params() {
    let app = setup_app(StoreBackend::Sqlite).await;
    for (name, artist) in [("b", "z"), ("a", "y"), ("c", "x")] {
        app.store.create_item(Item::new(name, artist, None)).await.unwrap();
    }

    let response = app
        .request(test_request("GET", "/api/items?sort=color&order=sideways&page=abc"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["sort"], "name");
    assert_eq!(body["order"], "asc");
    assert_eq!(body["pagination"]["page"], 1);
    let names: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_list_items_by_artist_desc() {
    let app = setup_app(StoreBackend::Sqlite).await;
    for (name, artist) in [("b", "z"), ("a", "y"), ("c", "x")] {
        app.store.create_item(Item::new(name, artist, None)).await.unwrap();
    }

    let response = app
        .request(test_request("GET", "/api/items?sort=artist&order=desc"))
        .await;
    let body = extract_json(response.into_body()).await;
    let artists: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["artist"].as_str().unwrap())
        .collect();
    assert_eq!(artists, vec!["z", "y", "x"]);
}

#[tokio::test]
async fn test_list_items_second_page() {
    let app = setup_app(StoreBackend::Sqlite).await;
    for i in 0..55 {
        app.store
            .create_item(Item::new(format!("item {:02}", i), "artist", None))
            .await
            .unwrap();
    }

    let response = app.request(test_request("GET", "/api/items?page=2")).await;
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["total"], 55);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["has_prev"], true);
    assert_eq!(body["pagination"]["has_next"], false);
    assert_eq!(body["items"].as_array().unwrap().len(), 5);
    assert_eq!(body["items"][0]["name"], "item 50");
}

// =============================================================================
// Log Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_logs_keep_dangling_reference() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let created = create_item(&app, json!({"name": "Gone", "artist": "Soon", "log": true})).await;
    let id = created["item"]["id"].as_u64().unwrap();
    let log_id = created["log_entry"]["id"].as_u64().unwrap();

    app.request(test_request("DELETE", &format!("/api/items/{}", id))).await;

    let response = app.request(test_request("GET", "/api/logs")).await;
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["entries"][0]["item_id"], id);
    assert!(body["entries"][0]["item"].is_null());

    let response = app.request(test_request("GET", &format!("/api/logs/{}", log_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(extract_json(response.into_body()).await["item"].is_null());
}

#[tokio::test]
async fn test_logs_default_newest_first() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let mut ids = Vec::new();
    for item_id in [1, 2, 3] {
        let response = app
            .request(json_request("POST", "/api/logs", json!({"item_id": item_id})))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(extract_json(response.into_body()).await["id"].as_u64().unwrap());
        // Distinct timestamps so time order equals creation order
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let listed_ids = |body: &Value| -> Vec<u64> {
        body["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_u64().unwrap())
            .collect()
    };

    let response = app.request(test_request("GET", "/api/logs")).await;
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["order"], "desc");
    let mut newest_first = ids.clone();
    newest_first.reverse();
    assert_eq!(listed_ids(&body), newest_first);

    let response = app.request(test_request("GET", "/api/logs?order=asc")).await;
    let body = extract_json(response.into_body()).await;
    assert_eq!(listed_ids(&body), ids);
}

#[tokio::test]
async fn test_delete_log() {
    let app = setup_app(StoreBackend::Sqlite).await;
    let response = app
        .request(json_request("POST", "/api/logs", json!({"item_id": 9})))
        .await;
    let log_id = extract_json(response.into_body()).await["id"].as_u64().unwrap();

    let response = app.request(test_request("DELETE", &format!("/api/logs/{}", log_id))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.request(test_request("GET", &format!("/api/logs/{}", log_id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Key-value backend smoke test
// =============================================================================

#[tokio::test]
async fn test_kv_backend_scan_flow() {
    let app = setup_app(StoreBackend::Kv).await;
    create_item(&app, json!({"name": "Homogenic", "artist": "Björk", "tag": "KV1"})).await;

    app.request(scan_request("KV1")).await;
    app.request(scan_request("KV1")).await;
    app.resolver.wait_idle().await;

    // Second scan is an immediate repeat and is suppressed
    assert_eq!(app.store.count_logs().await.unwrap(), 1);
}

// =============================================================================
// Partial failure on create
// =============================================================================

/// Real store whose play log writes always fail
struct LogFailingStore {
    inner: Arc<dyn Store>,
}

#[async_trait]
impl Store for LogFailingStore {
    async fn create_item(&self, item: Item) -> Result<Item> {
        self.inner.create_item(item).await
    }
    async fn update_item(&self, item: Item) -> Result<Item> {
        self.inner.update_item(item).await
    }
    async fn set_item_tag(&self, id: u64, tag: &str) -> Result<Item> {
        self.inner.set_item_tag(id, tag).await
    }
    async fn get_item(&self, id: u64) -> Result<Item> {
        self.inner.get_item(id).await
    }
    async fn get_item_by_tag(&self, tag: &str) -> Result<Item> {
        self.inner.get_item_by_tag(tag).await
    }
    async fn delete_item(&self, id: u64) -> Result<()> {
        self.inner.delete_item(id).await
    }
    async fn list_items(
        &self,
        sort: ItemSort,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Item>> {
        self.inner.list_items(sort, order, offset, limit).await
    }
    async fn count_items(&self) -> Result<u64> {
        self.inner.count_items().await
    }
    async fn create_log(&self, _item_id: u64) -> Result<LogEntry> {
        Err(Error::Internal("log table locked".to_string()))
    }
    async fn get_log(&self, id: u64) -> Result<LogEntry> {
        self.inner.get_log(id).await
    }
    async fn list_logs(&self, order: SortOrder, offset: u64, limit: u64) -> Result<Vec<LogEntry>> {
        self.inner.list_logs(order, offset, limit).await
    }
    async fn count_logs(&self) -> Result<u64> {
        self.inner.count_logs().await
    }
    async fn delete_log(&self, id: u64) -> Result<()> {
        self.inner.delete_log(id).await
    }
}

#[tokio::test]
async fn test_create_with_log_survives_log_failure() {
    let dir = TempDir::new().unwrap();
    let inner = open_store(StoreBackend::Sqlite, dir.path()).await.unwrap();
    let app = setup_app_over(Arc::new(LogFailingStore { inner }), dir);

    app.request(scan_request("NEW1")).await;
    app.resolver.wait_idle().await;

    let response = app
        .request(json_request(
            "POST",
            "/api/items",
            json!({"name": "Abbey Road", "artist": "The Beatles", "tag": "NEW1", "log": true}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["item"]["name"], "Abbey Road");
    assert!(body["log_entry"].is_null());
    let id = body["item"]["id"].as_u64().unwrap();
    assert_eq!(app.store.get_item(id).await.unwrap().tag.as_deref(), Some("NEW1"));
    assert_eq!(app.store.count_logs().await.unwrap(), 0);
    assert_eq!(app.resolver.pending_tag(), None);
}
