//! Integration tests for the interception policy.
//!
//! Uses wiremock for the origin server. Call-count expectations
//! (`expect(0)` / `expect(1)`) prove when the network is and is not
//! consulted; wiremock verifies them when the MockServer drops.

use std::sync::Arc;

use offcache_daemon::intercept::{InterceptPolicy, Outcome, Source};
use offcache_daemon::net::NetworkClient;
use offcache_daemon::store::{CacheStore, MemoryStore, RequestKey, ResponseSnapshot};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATION: &str = "app-cache-v1";

fn policy(store: Arc<MemoryStore>, offline_fallback: Option<String>) -> InterceptPolicy {
    InterceptPolicy::new(
        store,
        NetworkClient::new().expect("failed to create client"),
        GENERATION.to_string(),
        offline_fallback,
    )
}

fn snapshot(status: u16, body: &[u8]) -> ResponseSnapshot {
    ResponseSnapshot::new(
        status,
        vec![("content-type".to_string(), "text/plain".to_string())],
        body.to_vec(),
    )
}

#[tokio::test]
async fn test_cache_hit_never_touches_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from network"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let url = format!("{}/app.js", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let cached = snapshot(200, b"from cache");
    store
        .put(GENERATION, &RequestKey::get(&url), &cached)
        .unwrap();

    let policy = policy(Arc::clone(&store), None);
    match policy.handle("GET", &url, &[]).await {
        Outcome::Response { snapshot, source } => {
            assert_eq!(source, Source::Cache);
            // Byte-identical to the stored entry
            assert_eq!(snapshot, cached);
        }
        other => panic!("Expected cached response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_miss_with_200_populates_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/styles.css"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body { }"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/styles.css", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let policy = policy(Arc::clone(&store), None);

    // First request goes to the network
    match policy.handle("GET", &url, &[]).await {
        Outcome::Response { snapshot, source } => {
            assert_eq!(source, Source::Network);
            assert_eq!(snapshot.status, 200);
            assert_eq!(snapshot.body, b"body { }");
        }
        other => panic!("Expected network response, got {:?}", other),
    }

    // Second identical request is served from cache; wiremock's
    // expect(1) verifies no second network call happened
    match policy.handle("GET", &url, &[]).await {
        Outcome::Response { snapshot, source } => {
            assert_eq!(source, Source::Cache);
            assert_eq!(snapshot.body, b"body { }");
        }
        other => panic!("Expected cached response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_200_returned_but_never_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = format!("{}/missing", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let policy = policy(Arc::clone(&store), None);

    for _ in 0..2 {
        match policy.handle("GET", &url, &[]).await {
            Outcome::Response { snapshot, source } => {
                assert_eq!(source, Source::Network);
                assert_eq!(snapshot.status, 404);
            }
            other => panic!("Expected network response, got {:?}", other),
        }
    }

    assert_eq!(store.entry_count(GENERATION), 0);
    assert!(store.get(&RequestKey::get(&url)).unwrap().is_none());
}

#[tokio::test]
async fn test_success_ish_status_other_than_200_not_cached() {
    let mock_server = MockServer::start().await;

    // 204 is a success status, but only exactly 200 is cached
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&mock_server)
        .await;

    let url = format!("{}/moved", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let policy = policy(Arc::clone(&store), None);

    for _ in 0..2 {
        match policy.handle("GET", &url, &[]).await {
            Outcome::Response { snapshot, .. } => assert_eq!(snapshot.status, 204),
            other => panic!("Expected network response, got {:?}", other),
        }
    }

    assert_eq!(store.entry_count(GENERATION), 0);
}

#[tokio::test]
async fn test_non_get_is_passthrough() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let url = format!("{}/api/update", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let policy = policy(Arc::clone(&store), None);

    assert!(matches!(
        policy.handle("POST", &url, &[]).await,
        Outcome::Passthrough
    ));

    // No cache interaction of any kind
    assert_eq!(store.entry_count(GENERATION), 0);
    let stats = store.stats();
    assert_eq!(stats.hits + stats.misses, 0);
}

#[tokio::test]
async fn test_pseudo_protocol_is_passthrough() {
    let store = Arc::new(MemoryStore::new());
    let policy = policy(store, None);

    assert!(matches!(
        policy
            .handle("GET", "chrome-extension://abc/script.js", &[])
            .await,
        Outcome::Passthrough
    ));
}

#[tokio::test]
async fn test_stale_entry_served_without_revalidation() {
    let mock_server = MockServer::start().await;

    // The origin has newer content, but there is no freshness check
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let url = format!("{}/data.json", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    store
        .put(GENERATION, &RequestKey::get(&url), &snapshot(200, b"old"))
        .unwrap();

    let policy = policy(store, None);
    match policy.handle("GET", &url, &[]).await {
        Outcome::Response { snapshot, source } => {
            assert_eq!(source, Source::Cache);
            assert_eq!(snapshot.body, b"old");
        }
        other => panic!("Expected cached response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_network_failure_without_fallback_fails() {
    // Nothing listens on port 1
    let url = "http://127.0.0.1:1/unreachable";
    let store = Arc::new(MemoryStore::new());
    let policy = policy(store, None);

    assert!(matches!(
        policy.handle("GET", url, &[]).await,
        Outcome::Failed(_)
    ));
}

#[tokio::test]
async fn test_network_failure_serves_offline_fallback() {
    let fallback_url = "http://127.0.0.1:1/offline.html".to_string();
    let store = Arc::new(MemoryStore::new());
    let fallback = snapshot(200, b"<h1>offline</h1>");
    store
        .put(GENERATION, &RequestKey::get(&fallback_url), &fallback)
        .unwrap();

    let policy = policy(Arc::clone(&store), Some(fallback_url));
    match policy.handle("GET", "http://127.0.0.1:1/page", &[]).await {
        Outcome::Response { snapshot, source } => {
            assert_eq!(source, Source::Fallback);
            assert_eq!(snapshot.body, b"<h1>offline</h1>");
        }
        other => panic!("Expected fallback response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_request_headers_forwarded_to_origin() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/localized"))
        .and(wiremock::matchers::header("accept-language", "es"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hola"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/localized", mock_server.uri());
    let store = Arc::new(MemoryStore::new());
    let policy = policy(store, None);

    let headers = vec![("accept-language".to_string(), "es".to_string())];
    match policy.handle("GET", &url, &headers).await {
        Outcome::Response { snapshot, .. } => assert_eq!(snapshot.body, b"hola"),
        other => panic!("Expected network response, got {:?}", other),
    }
}
