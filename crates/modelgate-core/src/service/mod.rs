//! The gallery service: a single-worker queue of install and delete jobs.
//!
//! Producers call [`GalleryService::submit`], which returns once the worker
//! has accepted the job. Progress and results are observed by polling
//! [`GalleryService::get_status`].

mod dispatcher;
mod status;
mod worker;

pub use dispatcher::{Dispatcher, Outcome, Route};
pub use status::StatusTable;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bulk::BulkApplier;
use crate::config::AppConfig;
use crate::gallery::{
    Gallery, GalleryModel, GalleryOp, GalleryResolver, HttpGalleryResolver, OpStatus,
};
use crate::installer::{HttpInstaller, Installer};
use crate::network::HttpClient;
use crate::reconciler::{ConfigReconciler, FsConfigReconciler};
use crate::shutdown::Shutdown;
use crate::store::{FsModelStore, ModelStore};
use crate::{GalleryError, Result};

use worker::{Envelope, Worker};

pub struct GalleryService {
    queue: mpsc::Sender<Envelope>,
    statuses: StatusTable,
    dispatcher: Arc<Dispatcher>,
    config: AppConfig,
    galleries: RwLock<Vec<Gallery>>,
    shutdown: Shutdown,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl GalleryService {
    /// Start a service with the default filesystem and HTTP collaborators.
    pub async fn start(config: AppConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn builder(config: AppConfig) -> GalleryServiceBuilder {
        GalleryServiceBuilder::new(config)
    }

    /// Hand `op` to the worker, waiting until it has been accepted.
    pub async fn submit(&self, op: GalleryOp) -> Result<()> {
        if self.shutdown.is_triggered() {
            return Err(GalleryError::QueueClosed);
        }
        let id = op.id.clone();
        let (accepted, acknowledged) = oneshot::channel();
        self.queue
            .send(Envelope { op, accepted })
            .await
            .map_err(|_| GalleryError::QueueClosed)?;
        acknowledged.await.map_err(|_| GalleryError::QueueClosed)?;
        info!("Job {} accepted", id);
        Ok(())
    }

    pub fn get_status(&self, id: &str) -> Option<OpStatus> {
        self.statuses.get(id)
    }

    pub fn get_all_statuses(&self) -> HashMap<String, OpStatus> {
        self.statuses.get_all()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Snapshot of the catalogs in resolution order.
    pub fn galleries(&self) -> Vec<Gallery> {
        match self.galleries.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Append a catalog to the resolution order. Names must be unique.
    pub fn add_gallery(&self, gallery: Gallery) -> Result<Vec<Gallery>> {
        if gallery.name.trim().is_empty() || gallery.url.trim().is_empty() {
            return Err(GalleryError::validation(
                "gallery",
                "a gallery needs both a name and a url",
            ));
        }
        let mut galleries = match self.galleries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if galleries.iter().any(|g| g.name == gallery.name) {
            return Err(GalleryError::validation(
                "name",
                format!("gallery '{}' already exists", gallery.name),
            ));
        }
        info!("Adding gallery {} ({})", gallery.name, gallery.url);
        galleries.push(gallery);
        Ok(galleries.clone())
    }

    /// Remove the catalog named `name`.
    pub fn remove_gallery(&self, name: &str) -> Result<Vec<Gallery>> {
        let mut galleries = match self.galleries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = galleries.len();
        galleries.retain(|g| g.name != name);
        if galleries.len() == before {
            return Err(GalleryError::GalleryNotFound {
                name: name.to_string(),
            });
        }
        info!("Removed gallery {}", name);
        Ok(galleries.clone())
    }

    pub fn reconciler(&self) -> Arc<dyn ConfigReconciler> {
        self.dispatcher.reconciler().clone()
    }

    /// Bulk applier sharing this service's collaborators and galleries.
    ///
    /// Bulk apply bypasses the queue; run it before accepting jobs.
    pub fn bulk_applier(&self) -> BulkApplier {
        BulkApplier::new(self.dispatcher.clone(), self.galleries())
    }

    /// Catalog entries of `galleries`, flagged when a definition of that name is stored.
    pub async fn available_models(&self, galleries: &[Gallery]) -> Result<Vec<GalleryModel>> {
        let mut models = self.dispatcher.resolver().list_models(galleries).await?;
        let store = self.dispatcher.store();
        for model in &mut models {
            model.installed = store.contains(&model.name).await.unwrap_or(false);
        }
        Ok(models)
    }

    /// Stop accepting jobs and wait for the worker to finish its current one.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Gallery worker ended abnormally: {}", e);
            }
        }
    }
}

/// Builder for wiring a [`GalleryService`] with default or injected collaborators.
///
/// # Example
///
/// ```rust,ignore
/// use modelgate_core::{AppConfig, GalleryService};
///
/// let service = GalleryService::builder(AppConfig::new("./models"))
///     .auto_create_dirs(true)
///     .build()
///     .await?;
/// ```
pub struct GalleryServiceBuilder {
    config: AppConfig,
    auto_create_dirs: bool,
    client: Option<HttpClient>,
    store: Option<Arc<dyn ModelStore>>,
    installer: Option<Arc<dyn Installer>>,
    resolver: Option<Arc<dyn GalleryResolver>>,
    reconciler: Option<Arc<dyn ConfigReconciler>>,
}

impl GalleryServiceBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            auto_create_dirs: true,
            client: None,
            store: None,
            installer: None,
            resolver: None,
            reconciler: None,
        }
    }

    /// Create the model directory if it doesn't exist.
    ///
    /// Default: `true`. When disabled, a missing directory is a config error.
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// HTTP client shared by the default installer, resolver and reconciler.
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Definition store used by the dispatcher and by the default installer and reconciler.
    pub fn with_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn Installer>) -> Self {
        self.installer = Some(installer);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn GalleryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_reconciler(mut self, reconciler: Arc<dyn ConfigReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    fn ensure_model_path(&self) -> Result<()> {
        let path: &PathBuf = &self.config.model_path;
        if path.exists() {
            return Ok(());
        }
        if !self.auto_create_dirs {
            return Err(GalleryError::Config {
                message: format!("Model path does not exist: {}", path.display()),
            });
        }
        std::fs::create_dir_all(path).map_err(|e| GalleryError::Io {
            message: format!("Failed to create model path: {}", path.display()),
            path: Some(path.clone()),
            source: Some(e),
        })
    }

    /// Build the service and spawn its worker. Must run inside a tokio runtime.
    pub async fn build(self) -> Result<GalleryService> {
        self.ensure_model_path()?;

        let client = match self.client {
            Some(client) => client,
            None => HttpClient::new()?,
        };
        let model_path = self.config.model_path.clone();

        let store: Arc<dyn ModelStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FsModelStore::new(&model_path)),
        };
        let installer: Arc<dyn Installer> = match self.installer {
            Some(installer) => installer,
            None => Arc::new(HttpInstaller::new(client.clone(), store.clone())),
        };
        let resolver: Arc<dyn GalleryResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HttpGalleryResolver::new(client.clone())),
        };
        let reconciler: Arc<dyn ConfigReconciler> = match self.reconciler {
            Some(reconciler) => reconciler,
            None => Arc::new(FsConfigReconciler::new(
                client.clone(),
                store.clone(),
                self.config.defaults.clone(),
            )),
        };

        let dispatcher = Arc::new(Dispatcher::new(
            model_path,
            store,
            installer,
            resolver,
            reconciler,
        ));

        let (queue, receiver) = mpsc::channel(1);
        let statuses = StatusTable::new();
        let shutdown = Shutdown::new();

        let worker = Worker {
            dispatcher: dispatcher.clone(),
            statuses: statuses.clone(),
            opaque_errors: self.config.opaque_errors,
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(worker.run(receiver));

        info!(
            "Gallery service started for {} with {} galleries",
            self.config.model_path.display(),
            self.config.galleries.len()
        );

        Ok(GalleryService {
            queue,
            statuses,
            dispatcher,
            galleries: RwLock::new(self.config.galleries.clone()),
            config: self.config,
            shutdown,
            worker: Mutex::new(Some(handle)),
        })
    }
}
