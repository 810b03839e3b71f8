//! Job status polling.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use modelgate_core::OpStatus;

use crate::handler::ApiError;
use crate::server::AppState;

pub async fn handle_job_status(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> Result<Json<OpStatus>, ApiError> {
    state
        .service
        .get_status(&uuid)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("could not find any status for ID {}", uuid)))
}

pub async fn handle_jobs(State(state): State<Arc<AppState>>) -> Json<HashMap<String, OpStatus>> {
    Json(state.service.get_all_statuses())
}
