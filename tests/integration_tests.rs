//! End-to-end tests for the bandwidth-limited demo server.
//!
//! Each test starts the full router on an ephemeral port and talks to it
//! over real HTTP, so pacing is measured on the wall clock.
//!
//! Run with: `cargo test --test integration_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::net::TcpListener;

use response_throttle::{AppState, BytesPerSecond, Config, Enforcement, LimitMap, build_router};

/// Test fixture running the app server in the background.
struct TestFixture {
    base_url: String,
    client: Client,
    state: AppState,
}

impl TestFixture {
    async fn new(limits: &[(&str, u64)]) -> Self {
        Self::with_enforcement(limits, Enforcement::Throttle).await
    }

    async fn with_enforcement(limits: &[(&str, u64)], enforcement: Enforcement) -> Self {
        Self::with_config(limits, |config| config.enforcement = enforcement).await
    }

    async fn with_config(limits: &[(&str, u64)], customize: impl FnOnce(&mut Config)) -> Self {
        let bandwidth_limits: LimitMap = limits
            .iter()
            .map(|(endpoint, rate)| (endpoint.to_string(), BytesPerSecond::new(*rate).unwrap()))
            .collect();

        let mut config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            bandwidth_limits,
            metrics_port: 0,
            log_level: "warn".to_string(),
            ..Config::default()
        };
        customize(&mut config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to ephemeral port");
        let addr = listener.local_addr().expect("Failed to get local address");

        let (app, state) = build_router(config);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            state,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path`, returning status, body and the time until the body was complete.
    async fn timed_get(&self, path: &str) -> (StatusCode, Vec<u8>, Duration) {
        let start = Instant::now();
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Request failed");
        let status = response.status();
        let body = response.bytes().await.expect("Failed to read body");
        (status, body.to_vec(), start.elapsed())
    }
}

// ============================================================================
// Health & Info Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new(&[]).await;

    let response = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .expect("Health request failed");
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
    assert!(body.get("version").is_some());
    assert!(body.get("timestamp").is_some());
}

#[tokio::test]
async fn test_info_lists_routes_with_limits() {
    let fixture = TestFixture::new(&[("get_data", 10_000)]).await;

    let body: serde_json::Value = fixture
        .client
        .get(fixture.url("/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let routes = body["routes"].as_array().expect("routes missing");
    let data = routes
        .iter()
        .find(|r| r["path"] == "/data")
        .expect("/data missing");
    assert_eq!(data["endpoint"], "get_data");
    assert_eq!(data["limit"], 10_000);
}

// ============================================================================
// Throttling Tests
// ============================================================================

#[tokio::test]
async fn test_limited_endpoint_is_paced() {
    let fixture = TestFixture::new(&[("slow", 50)]).await;

    let (status, body, elapsed) = fixture.timed_get("/slow").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 150);
    assert!(elapsed >= Duration::from_millis(2500), "took {elapsed:?}");
}

#[tokio::test]
async fn test_unlimited_endpoint_is_fast() {
    let fixture = TestFixture::new(&[("slow", 50)]).await;

    let (status, body, elapsed) = fixture.timed_get("/fast").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 150);
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
}

#[tokio::test]
async fn test_handler_name_identifies_endpoint() {
    let fixture = TestFixture::new(&[("get_data", 50_000)]).await;

    let (status, body, elapsed) = fixture.timed_get("/data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 50_000);
    assert!(elapsed >= Duration::from_millis(800), "took {elapsed:?}");
}

#[tokio::test]
async fn test_large_sized_body_is_paced_over_content_length_framing() {
    // 50 000 bytes exceed the buffering threshold, so the body is paced while sent.
    let fixture = TestFixture::with_config(&[("get_data", 25_000)], |config| {
        config.max_buffered_body_size = 1000;
    })
    .await;

    let (status, body, elapsed) = fixture.timed_get("/data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 50_000);
    assert!(elapsed >= Duration::from_millis(1900), "took {elapsed:?}");
}

// Server, client and pacing share one thread: a blocking delay stalls `/fast`.
#[tokio::test]
async fn test_throttled_response_does_not_block_others() {
    let fixture = TestFixture::new(&[("stream_data", 100)]).await;

    let slow = fixture.timed_get("/stream?chunks=2&chunk_size=100");
    let fast = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fixture.timed_get("/fast").await
    };
    let ((_, slow_body, slow_elapsed), (_, _, fast_elapsed)) = tokio::join!(slow, fast);

    assert_eq!(slow_body.len(), 200);
    assert!(slow_elapsed >= Duration::from_millis(1500), "took {slow_elapsed:?}");
    assert!(fast_elapsed < Duration::from_secs(1), "took {fast_elapsed:?}");
}

#[tokio::test]
async fn test_streamed_body_is_intact() {
    let fixture = TestFixture::new(&[("stream_data", 4000)]).await;

    let (status, body, elapsed) = fixture.timed_get("/stream?chunks=20&chunk_size=100").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 2000);
    for (i, chunk) in body.chunks(100).enumerate() {
        let digit = b'0' + (i % 10) as u8;
        assert!(chunk.iter().all(|b| *b == digit), "chunk {i} corrupted");
    }
    assert!(elapsed >= Duration::from_millis(400), "took {elapsed:?}");
}

#[tokio::test]
async fn test_unknown_path_passes_through() {
    let fixture = TestFixture::new(&[("slow", 1)]).await;

    let (status, _, elapsed) = fixture.timed_get("/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(elapsed < Duration::from_secs(1));
}

// ============================================================================
// Runtime Limit Tests
// ============================================================================

#[tokio::test]
async fn test_runtime_limit_applies_to_next_request() {
    let fixture = TestFixture::new(&[]).await;

    let (_, _, before) = fixture.timed_get("/fast").await;
    assert!(before < Duration::from_secs(1));

    let response = fixture
        .client
        .put(fixture.url("/admin/limits"))
        .json(&json!({"endpoint": "fast", "limit": 100}))
        .send()
        .await
        .expect("Set limit request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["limit"], 100);

    let (_, body, after) = fixture.timed_get("/fast").await;
    assert_eq!(body.len(), 150);
    assert!(after >= Duration::from_millis(1200), "took {after:?}");
}

#[tokio::test]
async fn test_limiter_handle_changes_limits() {
    let fixture = TestFixture::new(&[("slow", 50)]).await;

    fixture
        .state
        .limiter
        .limit("slow", BytesPerSecond::new(1_000_000).unwrap());

    let (_, _, elapsed) = fixture.timed_get("/slow").await;
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");
}

#[tokio::test]
async fn test_delete_runtime_limit() {
    let fixture = TestFixture::new(&[]).await;
    fixture
        .state
        .limiter
        .limit("fast", BytesPerSecond::new(10).unwrap());

    let response = fixture
        .client
        .delete(fixture.url("/admin/limits/fast"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, _, elapsed) = fixture.timed_get("/fast").await;
    assert!(elapsed < Duration::from_secs(1), "took {elapsed:?}");

    let response = fixture
        .client
        .delete(fixture.url("/admin/limits/fast"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_runtime_limit_rejected() {
    let fixture = TestFixture::new(&[]).await;

    let response = fixture
        .client
        .put(fixture.url("/admin/limits"))
        .json(&json!({"endpoint": "fast", "limit": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_limit");
    assert!(fixture.state.limiter.snapshot().is_empty());
}

// ============================================================================
// Reject Mode Tests
// ============================================================================

#[tokio::test]
async fn test_reject_mode_returns_429() {
    let fixture = TestFixture::with_enforcement(&[("slow", 50)], Enforcement::Reject).await;

    let response = fixture.client.get(fixture.url("/slow")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bandwidth_limit_exceeded");
    assert_eq!(body["endpoint"], "slow");
    assert_eq!(body["limit"], 50);
}

#[tokio::test]
async fn test_reject_mode_throttles_unsized_bodies() {
    let fixture = TestFixture::with_enforcement(&[("stream_data", 400)], Enforcement::Reject).await;

    let (status, body, elapsed) = fixture.timed_get("/stream?chunks=4&chunk_size=100").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 400);
    assert!(elapsed >= Duration::from_millis(800), "took {elapsed:?}");
}
