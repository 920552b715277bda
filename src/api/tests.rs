use super::*;
use crate::lifecycle::{LifecycleSettings, SessionState, LOGGED_OUT};
use crate::testing::{MockClient, MOCK_MESSAGE_ID};
use crate::webhook::WebhookNotifier;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wabridge_core::config::WebhookConfig;
use wabridge_core::session::{ConnectionState, LifecycleEvent};

const KEY: &str = "secret";

/// Build a manager over `client` with a disabled webhook and short delays.
fn test_manager(client: Arc<MockClient>) -> SessionManager {
    let webhook = WebhookConfig {
        url: None,
        timeout_secs: 5,
        relay_messages: false,
    };
    SessionManager::new(
        client,
        Arc::new(SessionState::new()),
        WebhookNotifier::new(&webhook, KEY, "main").unwrap(),
        LifecycleSettings {
            session_id: "main".into(),
            settle_delay: Duration::from_millis(200),
            reconnect_delay: Duration::from_millis(200),
            log_qr: false,
            relay_messages: false,
        },
    )
}

fn test_router(manager: SessionManager) -> Router {
    build_router(ApiState::new(manager, KEY))
}

/// Router whose session has already reported ready.
fn connected_router(client: Arc<MockClient>) -> Router {
    let manager = test_manager(client);
    manager.handle_event(LifecycleEvent::Ready { info: Value::Null });
    test_router(manager)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("Content-Type", "application/json")
        .header("x-api-key", KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap()
}

/// Parse response body as JSON.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// ---------------------------------------------------------------------------
// Auth and health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_needs_no_auth() {
    let app = test_router(test_manager(MockClient::new()));
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "ok");
    let timestamp = json["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok(), "{timestamp}");
    assert!(timestamp.ends_with('Z'));
}

#[tokio::test]
async fn test_protected_routes_reject_missing_or_wrong_key() {
    let client = MockClient::new();
    let manager = test_manager(client.clone());

    for (method, uri) in [
        ("POST", "/client/sendMessage/main"),
        ("GET", "/session/status/main"),
        ("POST", "/session/logout/main"),
        ("POST", "/session/restart/main"),
    ] {
        for key in [None, Some("wrong"), Some("")] {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(key) = key {
                builder = builder.header("x-api-key", key);
            }
            let req = builder
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"chatId":"x@c.us","content":"hi"}"#))
                .unwrap();

            let resp = test_router(manager.clone()).oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri} {key:?}");
            assert_eq!(
                body_json(resp).await,
                json!({"success": false, "error": "Unauthorized"})
            );
        }
    }

    // Nothing reached the client.
    assert_eq!(MockClient::count(&client.send_calls), 0);
    assert_eq!(MockClient::count(&client.state_calls), 0);
    assert_eq!(MockClient::count(&client.logout_calls), 0);
    assert_eq!(MockClient::count(&client.destroy_calls), 0);
}

// ---------------------------------------------------------------------------
// Send message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_message_success() {
    let client = MockClient::new();
    let app = connected_router(client.clone());

    let resp = app
        .oneshot(post_json(
            "/client/sendMessage/main",
            r#"{"chatId":"1234567890@c.us","content":"hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"success": true, "id": MOCK_MESSAGE_ID})
    );
    assert_eq!(MockClient::count(&client.state_calls), 0);
}

#[tokio::test]
async fn test_send_message_missing_fields() {
    let client = MockClient::new();

    for body in [
        "",
        "{}",
        r#"{"chatId":"1234567890@c.us"}"#,
        r#"{"content":"hi"}"#,
        r#"{"chatId":"","content":"hi"}"#,
        "not json",
    ] {
        let app = connected_router(client.clone());
        let resp = app
            .oneshot(post_json("/client/sendMessage/main", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(
            body_json(resp).await,
            json!({"success": false, "error": "Missing chatId or content"})
        );
    }
    assert_eq!(MockClient::count(&client.send_calls), 0);
}

#[tokio::test]
async fn test_send_message_not_ready() {
    let client = MockClient::reporting(Some(ConnectionState::Initializing));
    let app = test_router(test_manager(client.clone()));

    let resp = app
        .oneshot(post_json(
            "/client/sendMessage/main",
            r#"{"chatId":"1234567890@c.us","content":"hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["state"], "INITIALIZING");
    assert_eq!(MockClient::count(&client.send_calls), 0);
}

#[tokio::test]
async fn test_send_message_client_error() {
    let client = MockClient::new();
    MockClient::fail(&client.fail_send);
    let app = connected_router(client);

    let resp = app
        .oneshot(post_json(
            "/client/sendMessage/main",
            r#"{"chatId":"1234567890@c.us","content":"hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("chat not found"));
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_status_reports_live_state() {
    let client = MockClient::reporting(Some(ConnectionState::Connected));
    let app = test_router(test_manager(client.clone()));

    let resp = app.oneshot(authed("GET", "/session/status/main")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({"success": true, "state": "CONNECTED"})
    );
    assert_eq!(MockClient::count(&client.state_calls), 1);
}

#[tokio::test]
async fn test_status_failure_is_http_200() {
    let client = MockClient::new();
    MockClient::fail(&client.fail_state);
    let app = test_router(test_manager(client));

    let resp = app.oneshot(authed("GET", "/session/status/main")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("page crashed"));
}

#[tokio::test]
async fn test_status_ignores_session_segment() {
    let client = MockClient::reporting(Some(ConnectionState::Disconnected));
    let app = test_router(test_manager(client));

    let resp = app
        .oneshot(authed("GET", "/session/status/someone-else"))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["state"], "DISCONNECTED");
}

// ---------------------------------------------------------------------------
// Logout / restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_logout_twice_within_settle_window() {
    let client = MockClient::new();
    let app = connected_router(client.clone());

    let first = app
        .clone()
        .oneshot(authed("POST", "/session/logout/main"))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        body_json(first).await,
        json!({"success": true, "message": LOGGED_OUT})
    );

    let second = app
        .oneshot(authed("POST", "/session/logout/main"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::ACCEPTED);
    assert_eq!(
        body_json(second).await,
        json!({"success": true, "message": "Restart already in progress."})
    );
    assert_eq!(MockClient::count(&client.logout_calls), 1);
}

#[tokio::test]
async fn test_restart_blocked_by_logout() {
    let client = MockClient::new();
    let app = connected_router(client.clone());

    app.clone()
        .oneshot(authed("POST", "/session/logout/main"))
        .await
        .unwrap();
    let resp = app
        .oneshot(authed("POST", "/session/restart/main"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(MockClient::count(&client.destroy_calls), 0);
}

#[tokio::test]
async fn test_restart_success() {
    let client = MockClient::new();
    let app = connected_router(client.clone());

    let resp = app
        .oneshot(authed("POST", "/session/restart/main"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Restarting session...");
    assert_eq!(MockClient::count(&client.destroy_calls), 1);
}

#[tokio::test]
async fn test_restart_failure_is_500_and_retryable() {
    let client = MockClient::new();
    MockClient::fail(&client.fail_destroy);
    let app = connected_router(client.clone());

    let resp = app
        .clone()
        .oneshot(authed("POST", "/session/restart/main"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(resp).await["success"], false);

    // The slot was released, so a second attempt reaches the client again.
    let resp = app
        .oneshot(authed("POST", "/session/restart/main"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(MockClient::count(&client.destroy_calls), 2);
}

#[tokio::test]
async fn test_logout_unrecoverable_is_500() {
    let client = MockClient::new();
    MockClient::fail(&client.fail_logout);
    MockClient::fail(&client.fail_destroy);
    let app = connected_router(client);

    let resp = app
        .oneshot(authed("POST", "/session/logout/main"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().contains("logout failed"));
}
