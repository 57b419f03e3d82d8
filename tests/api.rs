//! End-to-end behaviour of the dispatch endpoint, driven through the axum
//! router with `tower::ServiceExt::oneshot`.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use durable_kv::{
    app,
    handlers::dispatch_handlers::{ACCESS_KEY_HEADER, MAIN_KEY_HEADER},
    services::{
        access::AccessController, kv_store::KvStore, memory_store::MemoryKvStore,
        object_service::ObjectService, sqlite_store::SqliteKvStore,
    },
};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::util::ServiceExt;

struct Client {
    app: Router,
    main_key: Option<&'static str>,
    access_key: Option<&'static str>,
}

impl Client {
    fn new(app: Router) -> Self {
        Self {
            app,
            main_key: None,
            access_key: None,
        }
    }

    fn with_keys(&self, main_key: Option<&'static str>, access_key: Option<&'static str>) -> Self {
        Self {
            app: self.app.clone(),
            main_key,
            access_key,
        }
    }

    async fn raw(&self, method: &str, body: Body) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri("/");
        if let Some(key) = self.main_key {
            builder = builder.header(MAIN_KEY_HEADER, key);
        }
        if let Some(key) = self.access_key {
            builder = builder.header(ACCESS_KEY_HEADER, key);
        }
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn call(&self, body: Value) -> (StatusCode, Value) {
        self.raw("POST", Body::from(body.to_string())).await
    }

    async fn ok(&self, body: Value) -> Value {
        let (status, out) = self.call(body).await;
        assert_eq!(status, StatusCode::OK, "unexpected failure: {out}");
        out
    }

    async fn create(&self, name: Option<&str>) -> String {
        let out = self.ok(json!({ "method": "create", "name": name })).await;
        out["id"].as_str().unwrap().to_string()
    }
}

fn memory_client() -> Client {
    let service = ObjectService::new(Arc::new(MemoryKvStore::new()), AccessController::default());
    Client::new(app(service))
}

async fn sqlite_client() -> Client {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteKvStore::new(Arc::new(pool));
    store.migrate().await.unwrap();
    let service = ObjectService::new(Arc::new(store), AccessController::default());
    Client::new(app(service))
}

fn keys(entries: &Value) -> Vec<String> {
    entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["key"].as_str().unwrap().to_string())
        .collect()
}

async fn basic(client: Client) {
    let id = client.create(None).await;

    client
        .ok(json!({ "method": "write", "id": id, "key": "/users/1", "value": 1337 }))
        .await;
    let out = client
        .ok(json!({ "method": "read", "id": id, "key": "/users/1" }))
        .await;
    assert_eq!(out, json!({ "value": 1337 }));

    let out = client.ok(json!({ "method": "list", "id": id })).await;
    assert_eq!(out, json!([{ "key": "/users/1", "value": 1337 }]));

    let out = client
        .ok(json!({ "method": "delete", "id": id, "key": "/users/1" }))
        .await;
    assert_eq!(out, Value::Null);
    let out = client
        .ok(json!({ "method": "read", "id": id, "key": "/users/1" }))
        .await;
    assert_eq!(out, json!({ "value": null }));

    client
        .ok(json!({ "method": "delete", "id": id, "key": "/users/does-not-exist" }))
        .await;
}

#[tokio::test]
async fn basic_memory() {
    basic(memory_client()).await;
}

#[tokio::test]
async fn basic_sqlite() {
    basic(sqlite_client().await).await;
}

#[tokio::test]
async fn create_by_name_is_idempotent() {
    let client = sqlite_client().await;
    let id = client.create(Some("project/user:123")).await;
    client
        .ok(json!({ "method": "write", "id": id, "key": "key1", "value": 1337 }))
        .await;

    let id2 = client.create(Some("project/user:123")).await;
    assert_eq!(id, id2);
    let out = client
        .ok(json!({ "method": "read", "id": id2, "key": "key1" }))
        .await;
    assert_eq!(out["value"], 1337);

    let by_name = client
        .ok(json!({ "method": "read", "name": "project/user:123", "key": "key1" }))
        .await;
    assert_eq!(by_name["value"], 1337);
}

#[tokio::test]
async fn random_creates_are_distinct() {
    let client = memory_client();
    let mut ids = std::collections::HashSet::new();
    for _ in 0..200 {
        assert!(ids.insert(client.create(None).await));
    }
}

#[tokio::test]
async fn list_pagination_with_start_after() {
    let client = sqlite_client().await;
    let id = client.create(None).await;
    let entries: Vec<Value> = (0..15)
        .map(|i| json!({ "key": format!("/texts/{i:02}"), "value": "Hello World!" }))
        .collect();
    client
        .ok(json!({ "method": "write", "id": id, "entries": entries }))
        .await;

    let first = client
        .ok(json!({ "method": "list", "id": id, "options": { "limit": 10 } }))
        .await;
    let first = keys(&first);
    assert_eq!(first.len(), 10);

    let second = client
        .ok(json!({
            "method": "list",
            "id": id,
            "options": { "limit": 10, "startAfter": first.last().unwrap() },
        }))
        .await;
    let second = keys(&second);
    assert_eq!(second.len(), 5);
    assert!(second.iter().all(|k| !first.contains(k)));

    let unset = client
        .ok(json!({ "method": "list", "id": id, "options": { "limit": 0 } }))
        .await;
    assert_eq!(keys(&unset).len(), 15);

    let mut all = first.clone();
    all.extend(second);
    let mut sorted = all.clone();
    sorted.sort();
    assert_eq!(all, sorted);
}

#[tokio::test]
async fn list_prefix() {
    let client = memory_client();
    let id = client.create(None).await;
    client
        .ok(json!({ "method": "write", "id": id, "key": "/users/1", "value": { "name": "" } }))
        .await;
    client
        .ok(json!({ "method": "write", "id": id, "key": "/users/2", "value": { "name": "" } }))
        .await;
    client
        .ok(json!({ "method": "write", "id": id, "key": "/texts/a", "value": "Hello World!" }))
        .await;

    let users = client
        .ok(json!({ "method": "list", "id": id, "options": { "prefix": "/users/" } }))
        .await;
    assert_eq!(users.as_array().unwrap().len(), 2);
    let texts = client
        .ok(json!({ "method": "list", "id": id, "options": { "prefix": "/texts/" } }))
        .await;
    assert_eq!(texts.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn batch_delete() {
    let client = memory_client();
    let id = client.create(None).await;
    client
        .ok(json!({
            "method": "write",
            "id": id,
            "entries": [{ "key": "a", "value": 1 }, { "key": "b", "value": 2 }, { "key": "c", "value": 3 }],
        }))
        .await;
    client
        .ok(json!({ "method": "delete", "id": id, "keys": ["a", "c", "missing"] }))
        .await;
    let out = client.ok(json!({ "method": "list", "id": id })).await;
    assert_eq!(keys(&out), ["b"]);
}

#[tokio::test]
async fn purge_is_terminal() {
    let client = sqlite_client().await;
    let id = client.create(None).await;
    for key in ["/users/1", "/users/2", "/users/3"] {
        client
            .ok(json!({ "method": "write", "id": id, "key": key, "value": 1337 }))
            .await;
    }
    client.ok(json!({ "method": "purge", "id": id })).await;

    for body in [
        json!({ "method": "list", "id": id }),
        json!({ "method": "read", "id": id, "key": "/users/1" }),
        json!({ "method": "write", "id": id, "key": "/users/1", "value": 1 }),
    ] {
        let (status, out) = client.call(body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(out, json!({ "error": "OBJECT_NOT_FOUND" }));
    }
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let client = memory_client();
    let (status, out) = client
        .call(json!({ "method": "read", "id": "0123456789abcdef0123456789abcdef", "key": "k" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(out["error"], "OBJECT_NOT_FOUND");
}

#[tokio::test]
async fn main_and_access_keys() {
    let service = ObjectService::new(
        Arc::new(MemoryKvStore::new()),
        AccessController::new(Some("secret".into()), None),
    );
    let anonymous = Client::new(app(service));
    let admin = anonymous.with_keys(Some("secret"), None);

    let id = admin.create(None).await;
    admin
        .ok(json!({ "method": "write", "id": id, "key": "/users/1", "value": 1337 }))
        .await;

    let (status, out) = anonymous.call(json!({ "method": "create" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(out, json!({ "error": "INVALID_MAIN_KEY" }));

    let wrong = anonymous.with_keys(Some("guess"), None);
    let (status, _) = wrong.call(json!({ "method": "create" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    anonymous
        .ok(json!({ "method": "write", "id": id, "key": "/users/1", "value": 7 }))
        .await;
    let out = anonymous
        .ok(json!({ "method": "read", "id": id, "key": "/users/1" }))
        .await;
    assert_eq!(out["value"], 7);
}

#[tokio::test]
async fn access_key_required_when_configured() {
    let service = ObjectService::new(
        Arc::new(MemoryKvStore::new()),
        AccessController::new(None, Some("reader".into())),
    );
    let anonymous = Client::new(app(service));
    let id = anonymous.create(None).await;

    for client in [anonymous.with_keys(None, None), anonymous.with_keys(None, Some("bad"))] {
        let (status, out) = client
            .call(json!({ "method": "read", "id": id, "key": "k" }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(out, json!({ "error": "INVALID_ACCESS_KEY" }));
    }

    let reader = anonymous.with_keys(None, Some("reader"));
    reader
        .ok(json!({ "method": "write", "id": id, "key": "k", "value": true }))
        .await;
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let client = memory_client();
    let id = client.create(None).await;

    let (status, out) = client.raw("GET", Body::empty()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "INVALID_REQUEST");

    let (status, out) = client.raw("POST", Body::from("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "INVALID_REQUEST");

    for body in [
        json!({ "method": "explode", "id": id }),
        json!({ "method": "read", "key": "k" }),
        json!({ "method": "read", "id": id }),
        json!({ "method": "write", "id": id, "key": "k" }),
        json!({ "method": "list", "id": "objects" }),
    ] {
        let (status, out) = client.call(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(out["error"], "INVALID_REQUEST");
    }
}

#[tokio::test]
async fn storage_limits_are_propagated() {
    let client = sqlite_client().await;
    let id = client.create(None).await;
    let (status, out) = client
        .call(json!({ "method": "write", "id": id, "key": "k".repeat(2049), "value": 1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "STORAGE_ERROR");

    let (status, out) = client
        .call(json!({ "method": "write", "id": id, "key": "k", "value": "v".repeat(131_072) }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(out["error"], "STORAGE_ERROR");
}

#[tokio::test]
async fn writes_racing_a_purge_leave_nothing_behind() {
    let store = Arc::new(MemoryKvStore::new());
    let service = ObjectService::new(store.clone(), AccessController::default());
    let client = Client::new(app(service));
    let id = client.create(None).await;

    let writes = (0..50).map(|i| {
        let client = client.with_keys(None, None);
        let id = id.clone();
        tokio::spawn(async move {
            client
                .call(json!({ "method": "write", "id": id, "key": format!("k{i}"), "value": i }))
                .await
                .0
        })
    });
    let writes: Vec<_> = writes.collect();
    let purge = {
        let client = client.with_keys(None, None);
        let id = id.clone();
        tokio::spawn(async move { client.call(json!({ "method": "purge", "id": id })).await.0 })
    };

    assert_eq!(purge.await.unwrap(), StatusCode::OK);
    for status in futures::future::join_all(writes).await {
        let status = status.unwrap();
        assert!(status == StatusCode::OK || status == StatusCode::NOT_FOUND);
    }
    // Every write either landed before the purge (and was erased) or saw the
    // object as gone.
    assert_eq!(store.len(&id), 0);
    assert!(store.read("objects", &id).await.unwrap().is_none());
}

#[tokio::test]
async fn health_endpoints() {
    let client = sqlite_client().await;
    for uri in ["/healthz", "/readyz"] {
        let response = client
            .app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
