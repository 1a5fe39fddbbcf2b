//! Kubernetes filter against a fake metadata server

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use serde_json::json;

use tributary_protocol::{Entry, Fields, Record, Tag, Value};
use tributary_transform::{
    EntryState, Filter, HttpFetcher, KubernetesConfig, KubernetesFilter, MetadataFetcher,
    MetadataKey, ParserRegistry,
};

#[derive(Default)]
struct FakeServer {
    pods: HashMap<(String, String), serde_json::Value>,
    requests: AtomicU32,
    last_auth: parking_lot::Mutex<Option<String>>,
}

async fn get_pod(
    State(server): State<Arc<FakeServer>>,
    Path((namespace, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    server.requests.fetch_add(1, Ordering::SeqCst);
    *server.last_auth.lock() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    server
        .pods
        .get(&(namespace, name))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn start(server: Arc<FakeServer>) -> SocketAddr {
    let app = Router::new()
        .route("/api/v1/namespaces/{namespace}/pods/{name}", get(get_pod))
        .with_state(server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

fn server_with_alpha() -> Arc<FakeServer> {
    let mut server = FakeServer::default();
    server.pods.insert(
        ("default".into(), "alpha-container".into()),
        json!({
            "metadata": {
                "name": "alpha-container",
                "namespace": "default",
                "uid": "3f1c",
                "labels": {"app": "alpha"},
                "annotations": {"team": "core"}
            },
            "spec": {"nodeName": "node-1"}
        }),
    );
    Arc::new(server)
}

fn config(addr: SocketAddr) -> KubernetesConfig {
    KubernetesConfig {
        kube_url: format!("http://{}", addr),
        kube_token: Some("test-token".into()),
        tag_prefix: "svc.".into(),
        meta_key: Some("meta".into()),
        fetch_timeout: Duration::from_secs(2),
        fetch_backoff: Duration::from_millis(10),
        ..Default::default()
    }
}

async fn wait_resolved(filter: &KubernetesFilter, key: &MetadataKey) {
    for _ in 0..200 {
        match filter.cache().entry_info(key) {
            Some(info) if info.state == EntryState::Fetching => {
                tokio::time::sleep(Duration::from_millis(10)).await
            }
            _ => return,
        }
    }
    panic!("fetch for {} never resolved", key);
}

fn entry(tag: &str, log: &str) -> Entry {
    Entry::new(
        Tag::new(tag).unwrap(),
        Record::now(Fields::new()).with_field("log", log),
    )
}

fn meta<'r>(record: &'r Record, path: &[&str]) -> Option<&'r str> {
    let mut full = vec!["meta"];
    full.extend_from_slice(path);
    record.fields().get_path(&full).and_then(Value::as_str)
}

#[tokio::test]
async fn test_http_fetcher_decodes_pod() {
    let server = server_with_alpha();
    let addr = start(server.clone()).await;

    let fetcher = HttpFetcher::new(
        format!("http://{}", addr),
        Some("s3cret".into()),
        Duration::from_secs(2),
    )
    .unwrap();

    let doc = fetcher
        .fetch(&MetadataKey::new("default", "alpha-container"))
        .await
        .unwrap();

    assert_eq!(doc.namespace(), Some("default"));
    assert_eq!(doc.labels().get("app").and_then(Value::as_str), Some("alpha"));
    assert_eq!(server.last_auth.lock().as_deref(), Some("Bearer s3cret"));
}

#[tokio::test]
async fn test_http_fetcher_not_found() {
    let addr = start(server_with_alpha()).await;
    let fetcher =
        HttpFetcher::new(format!("http://{}", addr), None, Duration::from_secs(2)).unwrap();

    let err = fetcher
        .fetch(&MetadataKey::new("default", "ghost"))
        .await
        .unwrap_err();

    assert_eq!(err, tributary_transform::FetchError::Status { status: 404 });
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_filter_enriches_after_fetch() {
    let server = server_with_alpha();
    let addr = start(server.clone()).await;
    let filter =
        KubernetesFilter::new(config(addr), Arc::new(ParserRegistry::new())).unwrap();

    let first = filter
        .filter(vec![entry("svc.default.alpha-container", "one")])
        .await
        .unwrap();
    assert_eq!(meta(&first[0].record, &["namespace"]), Some("default"));
    assert!(meta(&first[0].record, &["labels", "app"]).is_none());

    wait_resolved(&filter, &MetadataKey::new("default", "alpha-container")).await;

    let second = filter
        .filter(vec![entry("svc.default.alpha-container", "two")])
        .await
        .unwrap();
    let record = &second[0].record;
    assert_eq!(second[0].tag.as_str(), "svc.default.alpha-container");
    assert_eq!(meta(record, &["namespace"]), Some("default"));
    assert_eq!(meta(record, &["labels", "app"]), Some("alpha"));
    assert_eq!(meta(record, &["host"]), Some("node-1"));
    assert_eq!(meta(record, &["id"]), Some("3f1c"));
    assert_eq!(record.get("log").and_then(Value::as_str), Some("two"));

    assert_eq!(server.requests.load(Ordering::SeqCst), 1);
    assert_eq!(server.last_auth.lock().as_deref(), Some("Bearer test-token"));
    filter.close().unwrap();
}

#[tokio::test]
async fn test_filter_not_found_stays_degraded() {
    let server = server_with_alpha();
    let addr = start(server.clone()).await;
    let filter =
        KubernetesFilter::new(config(addr), Arc::new(ParserRegistry::new())).unwrap();
    let key = MetadataKey::new("default", "ghost");

    filter.filter(vec![entry("svc.default.ghost", "one")]).await.unwrap();
    wait_resolved(&filter, &key).await;

    let info = filter.cache().entry_info(&key).unwrap();
    assert_eq!(info.state, EntryState::Absent);
    assert!(info.last_error.unwrap().contains("404"));

    let out = filter.filter(vec![entry("svc.default.ghost", "two")]).await.unwrap();
    let record = &out[0].record;
    assert_eq!(meta(record, &["namespace"]), Some("default"));
    assert!(record.fields().get_path(&["meta", "labels"]).is_none());
    assert_eq!(record.get("log").and_then(Value::as_str), Some("two"));
    filter.close().unwrap();
}

#[tokio::test]
async fn test_unreachable_server_degrades() {
    // Bind then drop to get a port nothing listens on
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = KubernetesConfig {
        fetch_retries: 2,
        ..config(addr)
    };
    let filter = KubernetesFilter::new(config, Arc::new(ParserRegistry::new())).unwrap();
    let key = MetadataKey::new("default", "alpha-container");

    let out = filter
        .filter(vec![entry("svc.default.alpha-container", "one")])
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(meta(&out[0].record, &["name"]), Some("alpha-container"));

    wait_resolved(&filter, &key).await;
    let info = filter.cache().entry_info(&key).unwrap();
    assert_eq!(info.state, EntryState::Absent);
    assert_eq!(filter.cache().stats().snapshot().fetch_failures, 1);
    filter.close().unwrap();
}
