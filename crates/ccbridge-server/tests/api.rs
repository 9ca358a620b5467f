#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! HTTP-level tests for the router, driven through `tower::ServiceExt::oneshot`
//! with a scripted connector in place of the `claude` subprocess.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use ccbridge_core::Config;
use ccbridge_core::ndjson::{Message, parse_line};
use ccbridge_server::api::{AppState, build_router};
use ccbridge_server::orchestrator::Orchestrator;
use ccbridge_server::session::{Connector, Session, SessionError, SessionOptions};

const CONVERSATION: &[&str] = &[
    r#"{"type":"system","subtype":"init","session_id":"s-1","model":"m","cwd":"/","tools":[]}"#,
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Opening a PR."},{"type":"tool_use","id":"t1","name":"mcp__github__create_pull_request","input":{"title":"hello world"}}]}}"#,
    r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"PR #1 created"}]}}"#,
    r#"{"type":"result","subtype":"success","session_id":"s-1","duration_ms":7,"num_turns":1}"#,
];

#[derive(Default)]
struct ScriptedConnector {
    fail_connect: bool,
    delay: Option<Duration>,
    closed: Arc<AtomicUsize>,
}

struct ScriptedSession {
    messages: VecDeque<Message>,
    delay: Option<Duration>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _options: &SessionOptions) -> Result<Box<dyn Session>, SessionError> {
        if self.fail_connect {
            return Err(SessionError::SpawnFailed {
                reason: "claude: No such file or directory".into(),
            });
        }
        Ok(Box::new(ScriptedSession {
            messages: CONVERSATION.iter().map(|l| parse_line(l).unwrap()).collect(),
            delay: self.delay,
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn query(&mut self, _prompt: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<Message>, SessionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.messages.pop_front())
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config() -> Arc<Config> {
    let mut config = Config::default();
    config.github.token = Some("ghp_test".into());
    Arc::new(config)
}

fn app_with(connector: ScriptedConnector) -> axum::Router {
    let orchestrator = Orchestrator::new(Arc::new(connector), config());
    build_router(AppState::new(orchestrator))
}

/// Send a request to the app and return (status, JSON body).
async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_healthy() {
    let app = app_with(ScriptedConnector::default());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn execute_returns_accumulated_result() {
    let app = app_with(ScriptedConnector::default());
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"query": "open a PR"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["result"],
        "Opening a PR.\n[tool_use] mcp__github__create_pull_request {\"title\":\"hello world\"}\nPR #1 created"
    );
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn execute_failure_is_500_with_detail() {
    let app = app_with(ScriptedConnector {
        fail_connect: true,
        ..ScriptedConnector::default()
    });
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"query": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("Failed to spawn assistant"));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn execute_without_credential_is_500() {
    let orchestrator = Orchestrator::new(
        Arc::new(ScriptedConnector::default()),
        Arc::new(Config::default()),
    );
    let app = build_router(AppState::new(orchestrator));
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"query": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("GITHUB_MCP_PAT"));
}

#[tokio::test]
async fn empty_query_is_400() {
    let app = app_with(ScriptedConnector::default());
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"query": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "query must not be empty");
}

#[tokio::test]
async fn missing_query_field_is_422() {
    let app = app_with(ScriptedConnector::default());
    let (status, body) = send(&app, "POST", "/execute", Some(json!({"prompt": "hi"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn background_acknowledges_before_slow_stream_completes() {
    let connector = ScriptedConnector {
        delay: Some(Duration::from_millis(300)),
        ..ScriptedConnector::default()
    };
    let closed = Arc::clone(&connector.closed);
    let app = app_with(connector);

    let started = std::time::Instant::now();
    let (status, body) = send(
        &app,
        "POST",
        "/execute/background",
        Some(json!({"query": "slow"})),
    )
    .await;
    let latency = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "message": "started"}));
    // Four messages at 300ms each would take over a second.
    assert!(latency < Duration::from_millis(250), "latency: {latency:?}");
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    tokio::time::timeout(Duration::from_secs(10), async {
        while closed.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn background_failure_still_acknowledged() {
    let app = app_with(ScriptedConnector {
        fail_connect: true,
        ..ScriptedConnector::default()
    });
    let (status, body) = send(
        &app,
        "POST",
        "/execute/background",
        Some(json!({"query": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "started");
}

#[tokio::test]
async fn users_get_sequential_ids_and_round_trip() {
    let app = app_with(ScriptedConnector::default());
    for expected in 1..=3 {
        let (status, body) = send(
            &app,
            "POST",
            "/users",
            Some(json!({"name": format!("user{expected}"), "email": "u@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], expected);
        assert_eq!(body["address"], Value::Null);
    }

    let (status, body) = send(&app, "GET", "/users/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"id": 2, "name": "user2", "email": "u@example.com", "address": null})
    );
}

#[tokio::test]
async fn unknown_user_is_404() {
    let app = app_with(ScriptedConnector::default());
    let (status, body) = send(&app, "GET", "/users/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "User not found");
}

#[tokio::test]
async fn non_numeric_user_id_is_422() {
    let app = app_with(ScriptedConnector::default());
    let (status, _) = send(&app, "GET", "/users/abc", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn address_update_then_read_back() {
    let app = app_with(ScriptedConnector::default());
    send(
        &app,
        "POST",
        "/users",
        Some(json!({"name": "Ada", "email": "ada@example.com", "address": "old"})),
    )
    .await;

    let (status, body) = send(
        &app,
        "PUT",
        "/users/1/address",
        Some(json!({"address": "12 Analytical St"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Address updated successfully");
    assert_eq!(body["user"]["address"], "12 Analytical St");

    let (_, body) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(body["address"], "12 Analytical St");
}

#[tokio::test]
async fn address_update_unknown_user_is_404_and_creates_nothing() {
    let app = app_with(ScriptedConnector::default());
    let (status, _) = send(
        &app,
        "PUT",
        "/users/5/address",
        Some(json!({"address": "nowhere"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/users/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"name": "first", "email": "f@example.com"})),
    )
    .await;
    assert_eq!(body["id"], 1);
}
