use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;
use wabridge_core::{error::BridgeError, sanitize::mask_chat_id};

use super::ApiState;
use crate::lifecycle::{SendOutcome, TeardownOutcome};

type ApiResponse = (StatusCode, Json<Value>);

/// Send-message request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    chat_id: Option<String>,
    content: Option<String>,
}

impl SendMessageRequest {
    /// Both fields, if present and non-empty.
    fn parse(body: &[u8]) -> Option<(String, String)> {
        let request: Self = serde_json::from_slice(body).ok()?;
        let chat_id = request.chat_id.filter(|c| !c.is_empty())?;
        let content = request.content.filter(|c| !c.is_empty())?;
        Some((chat_id, content))
    }
}

fn failure(status: StatusCode, err: &BridgeError) -> ApiResponse {
    (
        status,
        Json(json!({"success": false, "error": err.to_string()})),
    )
}

/// `POST /client/sendMessage/{session_id}`
pub(super) async fn send_message(
    State(state): State<ApiState>,
    Path(_session_id): Path<String>,
    body: Bytes,
) -> ApiResponse {
    let Some((chat_id, content)) = SendMessageRequest::parse(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Missing chatId or content"})),
        );
    };

    match state.manager.send_message(&chat_id, &content).await {
        Ok(SendOutcome::Sent { message_id }) => (
            StatusCode::OK,
            Json(json!({"success": true, "id": message_id})),
        ),
        Ok(SendOutcome::NotReady(current)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"success": false, "error": "Client not ready", "state": current})),
        ),
        Err(e) => {
            error!("send to {} failed: {e}", mask_chat_id(&chat_id));
            failure(StatusCode::INTERNAL_SERVER_ERROR, &e)
        }
    }
}

/// `GET /session/status/{session_id}`. Failures are reported with HTTP 200.
pub(super) async fn status(
    State(state): State<ApiState>,
    Path(_session_id): Path<String>,
) -> ApiResponse {
    match state.manager.refresh_state().await {
        Ok(current) => (
            StatusCode::OK,
            Json(json!({"success": true, "state": current})),
        ),
        Err(e) => {
            error!("status query failed: {e}");
            failure(StatusCode::OK, &e)
        }
    }
}

fn teardown_response(result: Result<TeardownOutcome, BridgeError>) -> ApiResponse {
    match result {
        Ok(TeardownOutcome::Started(message)) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": message})),
        ),
        Ok(TeardownOutcome::AlreadyInProgress) => (
            StatusCode::ACCEPTED,
            Json(json!({"success": true, "message": "Restart already in progress."})),
        ),
        Err(e) => failure(StatusCode::INTERNAL_SERVER_ERROR, &e),
    }
}

/// `POST /session/logout/{session_id}`
pub(super) async fn logout(
    State(state): State<ApiState>,
    Path(_session_id): Path<String>,
) -> ApiResponse {
    teardown_response(state.manager.logout().await)
}

/// `POST /session/restart/{session_id}`
pub(super) async fn restart(
    State(state): State<ApiState>,
    Path(_session_id): Path<String>,
) -> ApiResponse {
    teardown_response(state.manager.restart().await)
}

/// `GET /health`
pub(super) async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
