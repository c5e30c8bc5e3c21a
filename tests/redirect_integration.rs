//! Redirect integration tests
//!
//! These tests drive the full router and verify that redirects only happen for
//! validated, safe and reachable mappings, and that every resolved visit is
//! recorded as a click.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use snip::api::{create_app, AppState};
use snip::clicks::MemoryClickLogger;
use snip::config::ProxyConfig;
use snip::creator::DefaultCreator;
use snip::links::LinkBuilder;
use snip::models::{ShortUrlMapping, ShortUrlProperties, ValidationStatus, Verdict};
use snip::pipeline::RequestPipeline;
use snip::qr::PngQrGenerator;
use snip::ratelimit::KeyRateLimiter;
use snip::storage::{ShortUrlStore, SqliteStorage};
use snip::useragent::HeuristicClassifier;
use snip::validation::{StaticChecker, Validator};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn ShortUrlStore> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Insert test ConnectInfo extension
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));

        self.inner.call(req)
    }
}

fn build_app(
    storage: Arc<dyn ShortUrlStore>,
    clicks: Arc<MemoryClickLogger>,
    limiter: Option<KeyRateLimiter>,
) -> Router {
    let validator = Arc::new(Validator::new(
        Arc::clone(&storage),
        Arc::new(StaticChecker::permissive()),
        Arc::new(StaticChecker::permissive()),
    ));
    let creator = DefaultCreator::new(
        Arc::clone(&storage),
        validator,
        307,
        Duration::from_secs(1),
    );
    let links = LinkBuilder::new("http://localhost:8080");
    let pipeline = RequestPipeline::new(
        Arc::clone(&storage),
        Arc::new(creator),
        clicks,
        Arc::new(HeuristicClassifier),
        Arc::new(PngQrGenerator::new(storage, links.clone(), 10)),
        links,
    )
    .with_rate_limiter(limiter);

    create_app(Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        proxy: ProxyConfig::default(),
    }))
    .layer(TestConnectInfoLayer)
}

/// Store a mapping that has already been through validation
async fn insert_validated(
    storage: &Arc<dyn ShortUrlStore>,
    key: &str,
    target: &str,
    mode: u16,
    safe: bool,
    reachable: bool,
) {
    let mapping = ShortUrlMapping::new(key, target, mode, ShortUrlProperties::default(), true);
    storage.create_with_code(&mapping).await.unwrap();
    storage
        .update_validation(
            key,
            &ValidationStatus {
                validated: true,
                safe: Verdict::from(safe),
                reachable: Verdict::from(reachable),
                country: None,
            },
        )
        .await
        .unwrap();
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::USER_AGENT, CHROME_UA)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_redirect_uses_stored_mode() {
    let storage = create_test_storage().await;
    let clicks = Arc::new(MemoryClickLogger::new());
    insert_validated(&storage, "perm", "https://example.com/p", 301, true, true).await;
    insert_validated(&storage, "temp", "https://example.com/t", 307, true, true).await;
    let app = build_app(storage, clicks.clone(), None);

    let response = app.clone().oneshot(get("/perm")).await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/p"
    );

    let response = app.oneshot(get("/temp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/t"
    );

    let records = clicks.records("perm");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].properties.browser, "Chrome-58.0.3029.110");
    assert_eq!(records[0].properties.platform, "Windows");
    assert_eq!(records[0].properties.ip.as_deref(), Some("127.0.0.1"));
}

#[tokio::test]
async fn test_redirect_not_found() {
    let storage = create_test_storage().await;
    let clicks = Arc::new(MemoryClickLogger::new());
    let app = build_app(storage, clicks.clone(), None);

    let response = app.oneshot(get("/nonexistent")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json_body(response).await;
    assert_eq!(body["statusCode"], 404);
    assert_eq!(body["message"], "[nonexistent] is not known");
    assert!(body["timestamp"].is_string());
    assert!(clicks.records("nonexistent").is_empty());
}

#[tokio::test]
async fn test_reserved_paths_are_not_redirected() {
    let storage = create_test_storage().await;
    // Even an existing mapping is shadowed by the reserved prefix
    insert_validated(&storage, "indexed", "https://example.com", 307, true, true).await;
    let clicks = Arc::new(MemoryClickLogger::new());
    let app = build_app(storage, clicks.clone(), None);

    for path in ["/index.html", "/indexed", "/api"] {
        let response = app.clone().oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {}", path);
    }
    assert!(clicks.records("indexed").is_empty());
}

#[tokio::test]
async fn test_unsafe_target_is_forbidden_but_counted() {
    let storage = create_test_storage().await;
    insert_validated(&storage, "bad", "https://malware.test", 307, false, true).await;
    let clicks = Arc::new(MemoryClickLogger::new());
    let app = build_app(storage, clicks.clone(), None);

    let response = app.oneshot(get("/bad")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert!(response.headers().get(header::RETRY_AFTER).is_none());

    let body = json_body(response).await;
    assert_eq!(body["statusCode"], 403);
    assert_eq!(body["message"], "[https://malware.test] is not a safe Url");
    assert_eq!(clicks.records("bad").len(), 1);
}

#[tokio::test]
async fn test_unreachable_target_has_retry_after() {
    let storage = create_test_storage().await;
    insert_validated(&storage, "down", "https://down.test", 307, true, false).await;
    let clicks = Arc::new(MemoryClickLogger::new());
    let app = build_app(storage, clicks.clone(), None);

    let response = app.oneshot(get("/down")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "10000"
    );
    assert_eq!(clicks.records("down").len(), 1);
}

#[tokio::test]
async fn test_unvalidated_mapping_is_forbidden() {
    let storage = create_test_storage().await;
    let mapping = ShortUrlMapping::new(
        "fresh",
        "https://example.com",
        307,
        ShortUrlProperties::default(),
        false,
    );
    storage.create_with_code(&mapping).await.unwrap();
    let app = build_app(storage, Arc::new(MemoryClickLogger::new()), None);

    let response = app.oneshot(get("/fresh")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rate_limited_redirect() {
    let storage = create_test_storage().await;
    insert_validated(&storage, "hot", "https://example.com", 307, true, true).await;
    let clicks = Arc::new(MemoryClickLogger::new());
    let app = build_app(storage, clicks.clone(), KeyRateLimiter::from_limit(3));

    for _ in 0..3 {
        let response = app.clone().oneshot(get("/hot")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    let response = app.oneshot(get("/hot")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get(header::RETRY_AFTER).unwrap(),
        "10000"
    );
    assert_eq!(clicks.records("hot").len(), 3);
}

#[tokio::test]
async fn test_concurrent_redirects_all_logged() {
    let storage = create_test_storage().await;
    insert_validated(&storage, "popular", "https://example.com", 302, true, true).await;
    let clicks = Arc::new(MemoryClickLogger::new());
    let app = build_app(storage, clicks.clone(), None);

    let mut handles = vec![];
    for _ in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            app.oneshot(get("/popular")).await.unwrap().status()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::FOUND);
    }
    assert_eq!(clicks.records("popular").len(), 20);
}

#[tokio::test]
async fn test_qr_code_png() {
    let storage = create_test_storage().await;
    insert_validated(&storage, "withqr", "https://example.com", 307, true, true).await;
    let plain = ShortUrlMapping::new(
        "noqr",
        "https://example.com",
        307,
        ShortUrlProperties::default(),
        false,
    );
    storage.create_with_code(&plain).await.unwrap();
    let app = build_app(storage, Arc::new(MemoryClickLogger::new()), None);

    let response = app.clone().oneshot(get("/withqr/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[1..4], b"PNG");

    let response = app.clone().oneshot(get("/noqr/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["message"], "QR [noqr] doesn't exist");

    let response = app.oneshot(get("/missing/qr")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
