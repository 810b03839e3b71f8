//! Bearer API-key check for the gallery routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::handler::ApiError;
use crate::server::AppState;

/// Reject requests without an accepted `Authorization: Bearer <key>` header.
///
/// A server started without keys lets every request through.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.api_keys.is_empty() {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    let rejection = match provided {
        Some(key) if state.api_keys.iter().any(|k| k == key) => None,
        Some(_) => Some("invalid API key"),
        None => Some("an API key is required"),
    };
    match rejection {
        Some(message) => ApiError::unauthorized(message).into_response(),
        None => next.run(request).await,
    }
}
