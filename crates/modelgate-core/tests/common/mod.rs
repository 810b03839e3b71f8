//! In-memory collaborators for driving the gallery service in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use modelgate_core::store::FsModelStore;
use modelgate_core::{
    ConfigReconciler, Gallery, GalleryError, GalleryModel, GalleryResolver, GalleryService,
    Installer, ModelConfig, ModelDefinition, ModelFile, ModelStore, OpStatus, ProgressEvent,
    ProgressSink, Result,
};
use serde_json::{Map, Value};

pub const GALLERY_URL: &str = "mem://galleries/default";

pub fn default_galleries() -> Vec<Gallery> {
    vec![Gallery::new("default", GALLERY_URL)]
}

/// Resolver serving fixed indexes keyed by gallery url.
#[derive(Default)]
pub struct StubResolver {
    indexes: HashMap<String, Vec<GalleryModel>>,
}

impl StubResolver {
    pub fn with_models(names: &[&str]) -> Self {
        let models = names
            .iter()
            .map(|name| GalleryModel::new(*name, format!("mem://configs/{}", name)))
            .collect();
        let mut indexes = HashMap::new();
        indexes.insert(GALLERY_URL.to_string(), models);
        Self { indexes }
    }
}

#[async_trait]
impl GalleryResolver for StubResolver {
    async fn fetch_index(&self, gallery: &Gallery) -> Result<Vec<GalleryModel>> {
        self.indexes
            .get(&gallery.url)
            .cloned()
            .ok_or_else(|| GalleryError::Network {
                url: gallery.url.clone(),
                message: "unreachable".into(),
            })
    }

    async fn fetch_config(&self, url: &str) -> Result<ModelConfig> {
        let name = url.rsplit('/').next().unwrap_or(url).to_string();
        Ok(ModelConfig {
            name: name.clone(),
            files: vec![ModelFile::new(
                format!("{}.gguf", name),
                format!("mem://blobs/{}", name),
            )],
            ..Default::default()
        })
    }
}

/// One recorded installer call.
#[derive(Debug, Clone)]
pub struct InstallCall {
    pub name: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Installer that writes a definition, emits progress, and records timing.
#[derive(Default)]
pub struct RecordingInstaller {
    pub calls: Mutex<Vec<InstallCall>>,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub delay: Duration,
    pub failures: Mutex<HashMap<String, GalleryError>>,
}

impl RecordingInstaller {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Make installs of `name` fail with `error`.
    pub fn fail_on(&self, name: &str, error: GalleryError) {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), error);
    }

    pub fn installed_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }
}

fn clone_error(err: &GalleryError) -> GalleryError {
    match err {
        GalleryError::DownloadFailed { url, message } => GalleryError::DownloadFailed {
            url: url.clone(),
            message: message.clone(),
        },
        GalleryError::Network { url, message } => GalleryError::Network {
            url: url.clone(),
            message: message.clone(),
        },
        other => GalleryError::Other(other.to_string()),
    }
}

#[async_trait]
impl Installer for RecordingInstaller {
    async fn install(
        &self,
        model_path: &Path,
        name: &str,
        config: &ModelConfig,
        _overrides: &Map<String, Value>,
        progress: &ProgressSink,
    ) -> Result<()> {
        let started = Instant::now();
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let file = config
            .files
            .first()
            .map(|f| f.filename.clone())
            .unwrap_or_else(|| format!("{}.bin", name));
        let steps = 4u64;
        for step in 0..=steps {
            progress.emit(ProgressEvent::new(&file, step * 25, 100));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay / steps as u32).await;
            }
        }

        let failure = self.failures.lock().unwrap().get(name).map(clone_error);
        let result = match failure {
            Some(err) => Err(err),
            None => {
                FsModelStore::new(model_path)
                    .write(&ModelDefinition::new(name, file))
                    .await
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(InstallCall {
            name: name.to_string(),
            started,
            finished: Instant::now(),
        });
        result
    }
}

/// Reconciler counting calls, with switchable failure.
#[derive(Default)]
pub struct CountingReconciler {
    pub reloads: AtomicUsize,
    pub preloads: AtomicUsize,
    pub url_preloads: AtomicUsize,
    pub fail_reload: AtomicBool,
}

#[async_trait]
impl ConfigReconciler for CountingReconciler {
    async fn reload_all(&self, model_path: &Path) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reload.load(Ordering::SeqCst) {
            return Err(GalleryError::Io {
                message: format!("cannot read {}", model_path.display()),
                path: Some(model_path.to_path_buf()),
                source: None,
            });
        }
        Ok(())
    }

    async fn preload_defaults(&self, _model_path: &Path) -> Result<()> {
        self.preloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn preload_from_url(&self, _url: &str, _model_path: &Path) -> Result<()> {
        self.url_preloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub service: GalleryService,
    pub installer: Arc<RecordingInstaller>,
    pub reconciler: Arc<CountingReconciler>,
    pub store: Arc<FsModelStore>,
    pub dir: tempfile::TempDir,
}

pub async fn harness(
    installer: RecordingInstaller,
    resolver: StubResolver,
    opaque_errors: bool,
) -> Harness {
    let dir = tempfile::TempDir::new().unwrap();
    let installer = Arc::new(installer);
    let reconciler = Arc::new(CountingReconciler::default());
    let store = Arc::new(FsModelStore::new(dir.path()));

    let config = modelgate_core::AppConfig::new(dir.path())
        .with_galleries(default_galleries())
        .with_opaque_errors(opaque_errors);
    let service = GalleryService::builder(config)
        .with_store(store.clone())
        .with_installer(installer.clone())
        .with_resolver(Arc::new(resolver))
        .with_reconciler(reconciler.clone())
        .build()
        .await
        .unwrap();

    Harness {
        service,
        installer,
        reconciler,
        store,
        dir,
    }
}

/// Poll until job `id` is processed.
pub async fn wait_for(service: &GalleryService, id: &str) -> OpStatus {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(status) = service.get_status(id) {
                if status.processed {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

pub fn installed(store: &FsModelStore) -> HashSet<String> {
    std::fs::read_dir(store.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.strip_suffix(".json").map(str::to_string)
        })
        .collect()
}
