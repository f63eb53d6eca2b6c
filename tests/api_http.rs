// tests/api_http.rs
//
// HTTP-level tests for the trigger Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use news_curator::api::{self, AppState};
use news_curator::bootstrap::RunTrigger;
use news_curator::{PipelineError, RunMode, Stage};

const BODY_LIMIT: usize = 1024 * 1024;

/// Succeeds for candidate mode, fails for legacy; optionally slow.
struct StubRunner {
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait::async_trait]
impl RunTrigger for StubRunner {
    async fn trigger(&self, mode: RunMode, _now: DateTime<Utc>) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match mode {
            RunMode::Candidate => Ok("Saved: news/2026-10-16-candidates.json".to_string()),
            RunMode::Legacy => Err(PipelineError::empty(Stage::Legacy, "no digest was written")),
        }
    }
}

fn stub(delay: Duration) -> Arc<StubRunner> {
    Arc::new(StubRunner {
        calls: AtomicUsize::new(0),
        delay,
    })
}

fn test_router(runner: Arc<StubRunner>) -> Router {
    api::router(AppState::new(runner, 9))
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = test_router(stub(Duration::ZERO)).oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "OK");
}

#[tokio::test]
async fn run_defaults_to_candidate_mode() {
    let runner = stub(Duration::ZERO);
    let (status, v) = call(test_router(runner.clone()), "POST", "/run").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "success");
    assert_eq!(v["mode"], "candidate");
    assert!(v["message"].as_str().unwrap().contains("candidates.json"));
    // JST timestamp
    assert!(v["timestamp"].as_str().unwrap().ends_with("+09:00"));
    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_run_is_500_with_message() {
    let (status, v) = call(test_router(stub(Duration::ZERO)), "GET", "/run?mode=legacy").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["status"], "error");
    assert_eq!(v["mode"], "legacy");
    assert!(v["message"].as_str().unwrap().contains("legacy"));
}

#[tokio::test]
async fn unknown_mode_is_rejected() {
    let runner = stub(Duration::ZERO);
    let (status, _) = call(test_router(runner.clone()), "GET", "/run?mode=turbo").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_trigger_gets_conflict() {
    let runner = stub(Duration::from_millis(300));
    let app = test_router(runner.clone());

    let first = tokio::spawn(call(app.clone(), "POST", "/run"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, v) = call(app, "POST", "/run").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(v["status"], "error");

    let (first_status, _) = first.await.unwrap();
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
}
