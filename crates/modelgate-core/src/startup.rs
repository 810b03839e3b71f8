//! Preloading configured models before the server accepts requests.

use tracing::{info, warn};

use crate::bulk::BulkApplier;
use crate::config::AppConfig;
use crate::reconciler::ConfigReconciler;
use crate::{GalleryError, Result};

/// Apply `models_url`, the preload file and the inline preload JSON, in that order.
///
/// Every step runs even if an earlier one failed; the last error is returned.
/// When anything was attempted, definitions are reloaded afterwards.
pub async fn preload(
    config: &AppConfig,
    bulk: &BulkApplier,
    reconciler: &dyn ConfigReconciler,
) -> Result<()> {
    let mut last_error: Option<GalleryError> = None;
    let mut record = |step: &str, result: Result<()>| {
        if let Err(e) = result {
            warn!("Startup preload ({}) failed: {}", step, e);
            last_error = Some(e);
        }
    };

    for url in &config.models_url {
        info!("Preloading definitions from {}", url);
        record(
            "models url",
            reconciler.preload_from_url(url, &config.model_path).await,
        );
    }

    if let Some(path) = &config.preload_models_from_path {
        info!("Applying preload file {}", path.display());
        record("preload file", bulk.apply_from_file(path).await);
    }

    if let Some(payload) = config.preload_json_models.as_deref().filter(|p| !p.trim().is_empty()) {
        info!("Applying inline preload models");
        record("inline models", bulk.apply_from_str(payload).await);
    }

    let attempted = !config.models_url.is_empty()
        || config.preload_models_from_path.is_some()
        || config.preload_json_models.is_some();
    if attempted {
        let reconciled = async {
            reconciler.reload_all(&config.model_path).await?;
            reconciler.preload_defaults(&config.model_path).await
        }
        .await;
        record("reload", reconciled);
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
