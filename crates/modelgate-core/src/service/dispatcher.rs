//! Turning a queued operation into store, installer and reconciler calls.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::gallery::{
    merge_overrides, Gallery, GalleryModel, GalleryOp, GalleryReference, GalleryResolver,
    ModelConfig,
};
use crate::installer::Installer;
use crate::progress::ProgressSink;
use crate::reconciler::ConfigReconciler;
use crate::store::ModelStore;
use crate::{GalleryError, Result};

/// Result of a successful operation, recorded on the final job status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub deletion: bool,
    pub model_name: String,
}

/// Which branch an operation takes. Checked in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Delete(&'a str),
    Reference(GalleryReference),
    ConfigUrl(&'a str),
    Direct,
}

impl<'a> Route<'a> {
    pub fn of(op: &'a GalleryOp) -> Result<Self> {
        if op.delete {
            let name = op
                .reference()
                .or_else(|| Some(op.request.name.as_str()).filter(|n| !n.is_empty()))
                .ok_or_else(|| GalleryError::validation("name", "delete needs a model name"))?;
            return Ok(Route::Delete(name));
        }
        if let Some(reference) = op.reference() {
            return Ok(Route::Reference(GalleryReference::parse(reference)?));
        }
        if let Some(url) = op.config_url() {
            return Ok(Route::ConfigUrl(url));
        }
        Ok(Route::Direct)
    }
}

/// Shared resolution logic for queued jobs and bulk apply.
pub struct Dispatcher {
    model_path: PathBuf,
    store: Arc<dyn ModelStore>,
    installer: Arc<dyn Installer>,
    resolver: Arc<dyn GalleryResolver>,
    reconciler: Arc<dyn ConfigReconciler>,
}

impl Dispatcher {
    pub fn new(
        model_path: impl Into<PathBuf>,
        store: Arc<dyn ModelStore>,
        installer: Arc<dyn Installer>,
        resolver: Arc<dyn GalleryResolver>,
        reconciler: Arc<dyn ConfigReconciler>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            store,
            installer,
            resolver,
            reconciler,
        }
    }

    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Arc<dyn GalleryResolver> {
        &self.resolver
    }

    pub fn reconciler(&self) -> &Arc<dyn ConfigReconciler> {
        &self.reconciler
    }

    /// Run one queued operation to completion, including reconciliation.
    pub async fn dispatch(&self, op: &GalleryOp, progress: &ProgressSink) -> Result<Outcome> {
        let outcome = match Route::of(op)? {
            Route::Delete(name) => {
                self.delete(name).await?;
                Outcome {
                    deletion: true,
                    model_name: name.to_string(),
                }
            }
            Route::Reference(reference) => {
                let name = self
                    .install_reference(&reference, &op.galleries, &op.request, progress)
                    .await?;
                Outcome {
                    deletion: false,
                    model_name: name,
                }
            }
            Route::ConfigUrl(url) => {
                self.reconciler
                    .preload_from_url(url, &self.model_path)
                    .await?;
                self.reconciler
                    .preload_defaults(&self.model_path)
                    .await
                    .map_err(|e| GalleryError::reconciliation("preload", &e))?;
                Outcome {
                    deletion: false,
                    model_name: url.to_string(),
                }
            }
            Route::Direct => {
                let name = self.install_descriptor(None, &op.request, progress).await?;
                Outcome {
                    deletion: false,
                    model_name: name,
                }
            }
        };

        self.reconcile().await?;
        Ok(outcome)
    }

    /// Install by gallery reference when one is given, otherwise from `request` alone.
    ///
    /// Does not reconcile; callers decide when to reload.
    pub async fn install(
        &self,
        reference: Option<&str>,
        galleries: &[Gallery],
        request: &GalleryModel,
        progress: &ProgressSink,
    ) -> Result<String> {
        match reference.filter(|r| !r.trim().is_empty()) {
            Some(reference) => {
                let reference = GalleryReference::parse(reference)?;
                self.install_reference(&reference, galleries, request, progress)
                    .await
            }
            None => self.install_descriptor(None, request, progress).await,
        }
    }

    async fn install_reference(
        &self,
        reference: &GalleryReference,
        galleries: &[Gallery],
        request: &GalleryModel,
        progress: &ProgressSink,
    ) -> Result<String> {
        let entry = match &reference.gallery {
            Some(gallery) => {
                self.resolver
                    .resolve_by_reference(&reference.name, gallery, galleries)
                    .await?
            }
            None => self.resolver.resolve_by_name(&reference.name, galleries).await?,
        };
        debug!("Resolved {} to {}", reference, entry.url);
        self.install_descriptor(Some(&entry), request, progress)
            .await
    }

    /// Fetch the config for a descriptor, fold in the request's files and
    /// overrides, and hand it to the installer. Returns the installed name.
    async fn install_descriptor(
        &self,
        catalog: Option<&GalleryModel>,
        request: &GalleryModel,
        progress: &ProgressSink,
    ) -> Result<String> {
        let (name, config, overrides) = self.prepare_install(catalog, request).await?;
        self.installer
            .install(&self.model_path, &name, &config, &overrides, progress)
            .await?;
        info!("Model {} installed", name);
        Ok(name)
    }

    pub(crate) async fn prepare_install(
        &self,
        catalog: Option<&GalleryModel>,
        request: &GalleryModel,
    ) -> Result<(String, ModelConfig, Map<String, Value>)> {
        let source = catalog.unwrap_or(request);
        let catalog_files = catalog.map_or(0, |c| c.additional_files.len());
        if source.url.trim().is_empty() && request.additional_files.is_empty() && catalog_files == 0
        {
            return Err(GalleryError::validation(
                "url",
                format!(
                    "model '{}' has neither a config url nor files",
                    source.name
                ),
            ));
        }

        let mut config = if source.url.trim().is_empty() {
            ModelConfig {
                name: source.name.clone(),
                ..Default::default()
            }
        } else {
            self.resolver.fetch_config(&source.url).await?
        };

        let mut overrides = Map::new();
        if let Some(catalog) = catalog {
            config.files.extend(catalog.additional_files.iter().cloned());
            merge_overrides(&mut overrides, &catalog.overrides);
        }
        config.files.extend(request.additional_files.iter().cloned());
        merge_overrides(&mut overrides, &request.overrides);

        let name = [&request.name, &source.name, &config.name]
            .into_iter()
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| GalleryError::validation("name", "model name is missing"))?;

        Ok((name, config, overrides))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let definition = self.store.read(name).await?;
        let files = definition.files();
        self.store.delete(name, &files).await?;
        info!("Model {} deleted", name);
        Ok(())
    }

    /// Reload all definitions, then re-run the defaults preload.
    pub async fn reconcile(&self) -> Result<()> {
        self.reconciler
            .reload_all(&self.model_path)
            .await
            .map_err(|e| GalleryError::reconciliation("reload", &e))?;
        self.reconciler
            .preload_defaults(&self.model_path)
            .await
            .map_err(|e| GalleryError::reconciliation("preload", &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use crate::gallery::ModelFile;
    use crate::store::{FsModelStore, ModelDefinition};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn push(&self, call: impl Into<String>) {
            self.0.lock().unwrap().push(call.into());
        }
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    struct Stub {
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl GalleryResolver for Stub {
        async fn fetch_index(&self, gallery: &Gallery) -> Result<Vec<GalleryModel>> {
            self.calls.push(format!("index:{}", gallery.name));
            let mut entry = GalleryModel::new("llama", "mem://llama");
            entry.overrides = json!({"backend": "cpu", "parameters": {"threads": 1}})
                .as_object()
                .cloned()
                .unwrap();
            Ok(vec![entry])
        }

        async fn fetch_config(&self, url: &str) -> Result<ModelConfig> {
            self.calls.push(format!("config:{}", url));
            Ok(ModelConfig {
                name: "llama-upstream".into(),
                files: vec![ModelFile::new("llama.gguf", "mem://llama.gguf")],
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl Installer for Stub {
        async fn install(
            &self,
            _model_path: &Path,
            name: &str,
            config: &ModelConfig,
            overrides: &Map<String, Value>,
            _progress: &ProgressSink,
        ) -> Result<()> {
            self.calls.push(format!(
                "install:{}:{}:{}",
                name,
                config.files.len(),
                Value::Object(overrides.clone())
            ));
            Ok(())
        }
    }

    #[async_trait]
    impl ConfigReconciler for Stub {
        async fn reload_all(&self, _model_path: &Path) -> Result<()> {
            self.calls.push("reload");
            Ok(())
        }
        async fn preload_defaults(&self, _model_path: &Path) -> Result<()> {
            self.calls.push("preload");
            Ok(())
        }
        async fn preload_from_url(&self, url: &str, _model_path: &Path) -> Result<()> {
            self.calls.push(format!("preload_url:{}", url));
            Ok(())
        }
    }

    fn dispatcher(tmp: &TempDir) -> (Dispatcher, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let stub = Arc::new(Stub {
            calls: calls.clone(),
        });
        let dispatcher = Dispatcher::new(
            tmp.path(),
            Arc::new(FsModelStore::new(tmp.path())),
            stub.clone(),
            stub.clone(),
            stub,
        );
        (dispatcher, calls)
    }

    fn galleries() -> Vec<Gallery> {
        vec![Gallery::new("default", "mem://index")]
    }

    #[test]
    fn test_route_order() {
        let op = GalleryOp::delete("1", "llama").with_request(GalleryModel::new("x", "u"));
        assert_eq!(Route::of(&op).unwrap(), Route::Delete("llama"));

        let mut op = GalleryOp::from_gallery("2", "llama@default", galleries());
        op.config_url = Some("https://example.com/defs.json".into());
        assert!(matches!(Route::of(&op).unwrap(), Route::Reference(r) if r.is_qualified()));

        let op = GalleryOp::from_config_url("3", "https://example.com/defs.json");
        assert!(matches!(Route::of(&op).unwrap(), Route::ConfigUrl(_)));

        let op = GalleryOp::install("4", GalleryModel::new("x", "u"));
        assert_eq!(Route::of(&op).unwrap(), Route::Direct);
    }

    #[tokio::test]
    async fn test_reference_install_merges_request_overrides() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, calls) = dispatcher(&tmp);

        let mut request = GalleryModel::default();
        request.overrides = json!({"parameters": {"threads": 4}})
            .as_object()
            .cloned()
            .unwrap();
        request
            .additional_files
            .push(ModelFile::new("extra.bin", "mem://extra"));
        let op = GalleryOp::from_gallery("1", "llama@default", galleries()).with_request(request);

        let outcome = dispatcher
            .dispatch(&op, &ProgressSink::logging())
            .await
            .unwrap();
        assert_eq!(outcome.model_name, "llama");
        assert_eq!(
            calls.take(),
            vec![
                "index:default".to_string(),
                "config:mem://llama".to_string(),
                r#"install:llama:2:{"backend":"cpu","parameters":{"threads":4}}"#.to_string(),
                "reload".to_string(),
                "preload".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_direct_install_without_url_or_files_is_validation_error() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, calls) = dispatcher(&tmp);
        let op = GalleryOp::install("1", GalleryModel::new("bare", ""));
        let err = dispatcher
            .dispatch(&op, &ProgressSink::logging())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(calls.take().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found_without_reconcile() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, calls) = dispatcher(&tmp);
        let err = dispatcher
            .dispatch(&GalleryOp::delete("1", "ghost"), &ProgressSink::logging())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
        assert!(calls.take().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_files_and_reconciles() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, calls) = dispatcher(&tmp);
        FsModelStore::new(tmp.path())
            .write(&ModelDefinition::new("phi", "phi.gguf"))
            .await
            .unwrap();
        std::fs::write(tmp.path().join("phi.gguf"), b"w").unwrap();

        let outcome = dispatcher
            .dispatch(&GalleryOp::delete("1", "phi"), &ProgressSink::logging())
            .await
            .unwrap();
        assert!(outcome.deletion);
        assert!(!tmp.path().join("phi.gguf").exists());
        assert_eq!(calls.take(), vec!["reload", "preload"]);
    }

    #[tokio::test]
    async fn test_config_url_path() {
        let tmp = TempDir::new().unwrap();
        let (dispatcher, calls) = dispatcher(&tmp);
        dispatcher
            .dispatch(
                &GalleryOp::from_config_url("1", "https://example.com/defs.json"),
                &ProgressSink::logging(),
            )
            .await
            .unwrap();
        assert_eq!(
            calls.take(),
            vec![
                "preload_url:https://example.com/defs.json",
                "preload",
                "reload",
                "preload"
            ]
        );
    }
}
