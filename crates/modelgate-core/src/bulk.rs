//! Bulk install of a list of models, used at startup.
//!
//! Entries are installed one after another, outside the job queue and without
//! status tracking. Every entry is attempted; only the last error is returned.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gallery::{Gallery, GalleryModel};
use crate::progress::ProgressSink;
use crate::service::Dispatcher;
use crate::{GalleryError, Result};

/// One bulk entry: a descriptor, optionally resolved through a gallery reference in `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryRequest {
    /// `name` or `name@gallery`. Absent for direct installs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub model: GalleryModel,
}

impl GalleryRequest {
    pub fn by_reference(reference: impl Into<String>) -> Self {
        Self {
            id: Some(reference.into()),
            model: GalleryModel::default(),
        }
    }

    pub fn direct(model: GalleryModel) -> Self {
        Self { id: None, model }
    }

    fn label(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.model.name,
        }
    }
}

pub struct BulkApplier {
    dispatcher: Arc<Dispatcher>,
    galleries: Vec<Gallery>,
}

impl BulkApplier {
    pub fn new(dispatcher: Arc<Dispatcher>, galleries: Vec<Gallery>) -> Self {
        Self {
            dispatcher,
            galleries,
        }
    }

    /// Apply the JSON array of [`GalleryRequest`] stored at `path`.
    pub async fn apply_from_file(&self, path: &Path) -> Result<()> {
        let payload = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GalleryError::io_with_path(e, path))?;
        self.apply_from_str(&payload).await
    }

    /// Apply an inline JSON array of [`GalleryRequest`].
    pub async fn apply_from_str(&self, payload: &str) -> Result<()> {
        let requests: Vec<GalleryRequest> =
            serde_json::from_str(payload).map_err(|e| GalleryError::Json {
                message: format!("Invalid bulk model list: {}", e),
                source: Some(e),
            })?;
        self.apply(&requests).await
    }

    pub async fn apply(&self, requests: &[GalleryRequest]) -> Result<()> {
        let progress = ProgressSink::logging();
        let mut last_error: Option<GalleryError> = None;

        for request in requests {
            let result = self
                .dispatcher
                .install(
                    request.id.as_deref(),
                    &self.galleries,
                    &request.model,
                    &progress,
                )
                .await;

            match result {
                Ok(name) => info!("Bulk install of {} done", name),
                Err(e) => {
                    warn!("Bulk install of {} failed: {}", request.label(), e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_flattened() {
        let json = r#"[
            {"id": "llama@default"},
            {"name": "custom", "url": "https://example.com/custom.json", "overrides": {"f16": true}}
        ]"#;
        let requests: Vec<GalleryRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(requests[0].id.as_deref(), Some("llama@default"));
        assert!(requests[0].model.name.is_empty());
        assert!(requests[1].id.is_none());
        assert_eq!(requests[1].model.name, "custom");
        assert_eq!(requests[1].model.overrides["f16"], true);
        assert_eq!(requests[1].label(), "custom");
    }
}
