use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::warn;

use super::ApiState;

/// Constant-time comparison so the key cannot be guessed byte by byte.
fn keys_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Reject any request whose `x-api-key` does not equal the configured secret.
pub(super) async fn require_api_key(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get("x-api-key")
        .is_some_and(|given| keys_match(given.as_bytes(), state.api_key.as_bytes()));

    if !authorized {
        warn!("rejected {} {}: bad api key", request.method(), request.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"success": false, "error": "Unauthorized"})),
        )
            .into_response();
    }

    next.run(request).await
}
