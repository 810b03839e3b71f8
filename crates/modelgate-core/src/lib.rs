//! Modelgate Core - model gallery operations for a local inference gateway.
//!
//! This crate installs and deletes models from remote catalogs ("galleries")
//! through a single-worker job queue, tracks job progress in a status table,
//! and bulk-applies model lists at startup. It can be used programmatically
//! without the HTTP layer in `modelgate-server`.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelgate_core::{AppConfig, Gallery, GalleryOp, GalleryService};
//!
//! #[tokio::main]
//! async fn main() -> modelgate_core::Result<()> {
//!     let config = AppConfig::new("/var/lib/models")
//!         .with_galleries([Gallery::new("default", "https://example.com/index.json")]);
//!     let service = GalleryService::start(config.clone()).await?;
//!
//!     service
//!         .submit(GalleryOp::from_gallery("job-1", "llama@default", config.galleries))
//!         .await?;
//!     println!("{:?}", service.get_status("job-1"));
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod bulk;
pub mod config;
pub mod error;
pub mod gallery;
pub mod installer;
pub mod network;
pub mod progress;
pub mod reconciler;
pub mod service;
pub mod shutdown;
pub mod startup;
pub mod store;

pub use bulk::{BulkApplier, GalleryRequest};
pub use config::{AppConfig, DefinitionDefaults};
pub use error::{ErrorKind, GalleryError, Result};
pub use gallery::{
    Gallery, GalleryModel, GalleryOp, GalleryReference, GalleryResolver, ModelConfig, ModelFile,
    OpStatus,
};
pub use installer::Installer;
pub use progress::{ProgressEvent, ProgressSink};
pub use reconciler::ConfigReconciler;
pub use service::{GalleryService, GalleryServiceBuilder, StatusTable};
pub use shutdown::Shutdown;
pub use store::{ModelDefinition, ModelStore};
