//! Model install, delete and catalog endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use modelgate_core::{Gallery, GalleryModel, GalleryOp};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::handler::ApiError;
use crate::server::AppState;

/// Body of `POST /models/apply`.
#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    /// Gallery reference, `name` or `name@gallery`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub config_url: Option<String>,
    /// Overrides the configured galleries for this request.
    #[serde(default)]
    pub galleries: Vec<Gallery>,
    #[serde(flatten)]
    pub model: GalleryModel,
}

/// Returned by job-creating endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobCreated {
    pub uuid: String,
    /// Poll path for the job status.
    pub status: String,
}

impl JobCreated {
    fn new(uuid: String) -> Self {
        let status = format!("/models/jobs/{}", uuid);
        Self { uuid, status }
    }
}

pub async fn handle_apply(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<JobCreated>, ApiError> {
    let galleries = if request.galleries.is_empty() {
        state.service.galleries()
    } else {
        request.galleries
    };

    let uuid = Uuid::new_v4().to_string();
    let op = GalleryOp {
        id: uuid.clone(),
        request: request.model,
        gallery_reference: request.id,
        galleries,
        config_url: request.config_url,
        delete: false,
    };

    state.service.submit(op).await?;
    info!("Queued apply job {}", uuid);
    Ok(Json(JobCreated::new(uuid)))
}

pub async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<JobCreated>, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request("model name is required"));
    }

    let uuid = Uuid::new_v4().to_string();
    state
        .service
        .submit(GalleryOp::delete(uuid.clone(), name.clone()))
        .await?;
    info!("Queued delete job {} for {}", uuid, name);
    Ok(Json(JobCreated::new(uuid)))
}

pub async fn handle_available(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GalleryModel>>, ApiError> {
    let models = state
        .service
        .available_models(&state.service.galleries())
        .await?;
    Ok(Json(models))
}

pub async fn handle_galleries(State(state): State<Arc<AppState>>) -> Json<Vec<Gallery>> {
    Json(state.service.galleries())
}

/// Body of `DELETE /models/galleries`. Extra gallery fields are ignored.
#[derive(Debug, Deserialize)]
pub struct GalleryName {
    pub name: String,
}

pub async fn handle_add_gallery(
    State(state): State<Arc<AppState>>,
    Json(gallery): Json<Gallery>,
) -> Result<Json<Vec<Gallery>>, ApiError> {
    Ok(Json(state.service.add_gallery(gallery)?))
}

pub async fn handle_remove_gallery(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GalleryName>,
) -> Result<Json<Vec<Gallery>>, ApiError> {
    Ok(Json(state.service.remove_gallery(&body.name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_request_shapes() {
        let by_reference: ApplyRequest =
            serde_json::from_str(r#"{"id": "llama@default"}"#).unwrap();
        assert_eq!(by_reference.id.as_deref(), Some("llama@default"));
        assert!(by_reference.galleries.is_empty());

        let direct: ApplyRequest = serde_json::from_str(
            r#"{
                "name": "custom",
                "url": "https://example.com/custom.json",
                "overrides": {"backend": "llama-cpp"},
                "files": [{"filename": "a.bin", "uri": "https://example.com/a.bin"}],
                "galleries": [{"name": "mine", "url": "https://example.com/index.json"}]
            }"#,
        )
        .unwrap();
        assert!(direct.id.is_none());
        assert_eq!(direct.model.name, "custom");
        assert_eq!(direct.model.additional_files.len(), 1);
        assert_eq!(direct.galleries[0].name, "mine");
    }

    #[test]
    fn test_gallery_name_ignores_url() {
        let body: GalleryName =
            serde_json::from_str(r#"{"name": "mine", "url": "https://example.com/i.json"}"#)
                .unwrap();
        assert_eq!(body.name, "mine");
    }

    #[test]
    fn test_job_created_points_at_status() {
        let created = JobCreated::new("abc".into());
        assert_eq!(created.status, "/models/jobs/abc");
    }
}
