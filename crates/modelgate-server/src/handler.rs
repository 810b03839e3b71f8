//! Shared handler plumbing: health check and error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use modelgate_core::{ErrorKind, GalleryError};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

/// JSON error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A failed request: HTTP status plus message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<GalleryError> for ApiError {
    fn from(err: GalleryError) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::IoFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::ReconciliationFailure | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed ({}): {}", self.status, self.message);
        } else {
            debug!("Request rejected ({}): {}", self.status, self.message);
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
