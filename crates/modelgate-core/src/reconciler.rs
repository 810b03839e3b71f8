//! Keeping the in-memory view of model definitions in step with the store.
//!
//! After every install or delete the worker reloads all definitions and
//! re-runs the defaults preload; either failing marks the job as an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DefinitionDefaults;
use crate::network::{fetch_json, HttpClient, Location};
use crate::store::{ModelDefinition, ModelStore};
use crate::{GalleryError, Result};

#[async_trait]
pub trait ConfigReconciler: Send + Sync {
    /// Reload every definition found in `model_path`.
    async fn reload_all(&self, model_path: &Path) -> Result<()>;

    /// Materialize default configuration for loaded definitions.
    async fn preload_defaults(&self, model_path: &Path) -> Result<()>;

    /// Fetch a definition file (one object or an array) into `model_path`.
    async fn preload_from_url(&self, url: &str, model_path: &Path) -> Result<()>;
}

/// Reconciler reading and rewriting definitions through a [`ModelStore`].
pub struct FsConfigReconciler {
    client: HttpClient,
    store: Arc<dyn ModelStore>,
    defaults: DefinitionDefaults,
    loaded: RwLock<HashMap<String, ModelDefinition>>,
}

impl FsConfigReconciler {
    pub fn new(
        client: HttpClient,
        store: Arc<dyn ModelStore>,
        defaults: DefinitionDefaults,
    ) -> Self {
        Self {
            client,
            store,
            defaults,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Currently loaded definitions, sorted by name.
    pub fn loaded(&self) -> Vec<ModelDefinition> {
        let loaded = match self.loaded.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut definitions: Vec<_> = loaded.values().cloned().collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn get(&self, name: &str) -> Option<ModelDefinition> {
        let loaded = match self.loaded.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loaded.get(name).cloned()
    }

    fn replace_loaded(&self, definitions: Vec<ModelDefinition>) {
        let mut loaded = match self.loaded.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *loaded = definitions
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
    }

    async fn fill_defaults(&self) -> Result<usize> {
        let mut updated = Vec::new();
        for mut definition in self.loaded() {
            if definition.apply_defaults(&self.defaults) {
                self.store.write(&definition).await?;
                updated.push(definition);
            }
        }

        let count = updated.len();
        if count > 0 {
            let mut loaded = match self.loaded.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for definition in updated {
                loaded.insert(definition.name.clone(), definition);
            }
        }
        Ok(count)
    }

    async fn fetch_definitions(&self, url: &str) -> Result<Vec<ModelDefinition>> {
        let location = Location::parse(url)?;
        let document: Value = fetch_json(&self.client, &location).await?;
        let definitions = match document {
            Value::Array(_) => serde_json::from_value::<Vec<ModelDefinition>>(document)?,
            other => vec![serde_json::from_value::<ModelDefinition>(other)?],
        };
        if let Some(unnamed) = definitions.iter().position(|d| d.name.trim().is_empty()) {
            return Err(GalleryError::validation(
                "name",
                format!("definition #{} from {} has no name", unnamed, url),
            ));
        }
        Ok(definitions)
    }
}

#[async_trait]
impl ConfigReconciler for FsConfigReconciler {
    async fn reload_all(&self, model_path: &Path) -> Result<()> {
        let definitions = self
            .store
            .list_all()
            .await
            .map_err(|e| GalleryError::reconciliation("reload", &e))?;
        info!(
            "Loaded {} model definitions from {}",
            definitions.len(),
            model_path.display()
        );
        self.replace_loaded(definitions);
        Ok(())
    }

    async fn preload_defaults(&self, model_path: &Path) -> Result<()> {
        let updated = self
            .fill_defaults()
            .await
            .map_err(|e| GalleryError::reconciliation("preload", &e))?;
        debug!(
            "Filled defaults for {} definitions in {}",
            updated,
            model_path.display()
        );
        Ok(())
    }

    async fn preload_from_url(&self, url: &str, model_path: &Path) -> Result<()> {
        let definitions = self
            .fetch_definitions(url)
            .await
            .map_err(|e| GalleryError::reconciliation("preload_from_url", &e))?;

        for definition in &definitions {
            self.store
                .write(definition)
                .await
                .map_err(|e| GalleryError::reconciliation("preload_from_url", &e))?;
        }
        info!(
            "Preloaded {} definitions from {} into {}",
            definitions.len(),
            url,
            model_path.display()
        );
        Ok(())
    }
}
