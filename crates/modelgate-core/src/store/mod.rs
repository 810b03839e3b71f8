//! Model store: named definitions plus artifact files under one directory.
//!
//! The store is not locked. Callers serialize mutations; inside the gallery
//! service that is the single worker task.

mod atomic;
mod definition;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use definition::{ModelDefinition, Parameters};

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::PathsConfig;
use crate::gallery::validate_relative_name;
use crate::{GalleryError, Result};

/// Persistent storage of model definitions and their files.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Directory holding definitions and artifacts.
    fn root(&self) -> &Path;

    /// Read the definition for `name`. Absent definitions are [`GalleryError::ModelNotFound`].
    async fn read(&self, name: &str) -> Result<ModelDefinition>;

    async fn write(&self, definition: &ModelDefinition) -> Result<()>;

    /// Remove the definition for `name` and the given artifact files. Missing files are ignored.
    async fn delete(&self, name: &str, files: &[String]) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<ModelDefinition>>;

    async fn contains(&self, name: &str) -> Result<bool> {
        match self.read(name).await {
            Ok(_) => Ok(true),
            Err(GalleryError::ModelNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Run blocking definition I/O off the async worker threads.
async fn blocking<T, F>(task: F, what: &str) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| GalleryError::Other(format!("{} task failed: {}", what, e)))?
}

/// Filesystem store keeping `<name>.json` next to the artifacts.
#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn definition_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", name, PathsConfig::DEFINITION_EXTENSION))
    }

    pub fn template_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", name, PathsConfig::TEMPLATE_EXTENSION))
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!("Removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GalleryError::io_with_path(e, path)),
        }
    }
}

#[async_trait]
impl ModelStore for FsModelStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, name: &str) -> Result<ModelDefinition> {
        validate_relative_name("name", name)?;
        let path = self.definition_path(name);
        let found =
            blocking(move || atomic_read_json::<ModelDefinition>(&path), "definition read").await?;
        found.ok_or_else(|| GalleryError::ModelNotFound {
            name: name.to_string(),
        })
    }

    async fn write(&self, definition: &ModelDefinition) -> Result<()> {
        validate_relative_name("name", &definition.name)?;
        let path = self.definition_path(&definition.name);
        let definition = definition.clone();
        let written = path.clone();
        blocking(move || atomic_write_json(&path, &definition), "definition write").await?;
        debug!("Wrote definition {}", written.display());
        Ok(())
    }

    async fn delete(&self, name: &str, files: &[String]) -> Result<()> {
        validate_relative_name("name", name)?;
        for file in files {
            if let Err(e) = validate_relative_name("filename", file) {
                warn!("Not removing '{}' for model {}: {}", file, name, e);
                continue;
            }
            Self::remove_if_present(&self.root.join(file)).await?;
        }
        Self::remove_if_present(&self.template_path(name)).await?;
        Self::remove_if_present(&self.definition_path(name)).await?;
        info!("Deleted model {} ({} files)", name, files.len());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ModelDefinition>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GalleryError::io_with_path(e, &self.root)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| GalleryError::io_with_path(e, &self.root))?
        {
            let path = entry.path();
            let is_definition = path
                .extension()
                .is_some_and(|ext| ext == PathsConfig::DEFINITION_EXTENSION);
            if is_definition {
                paths.push(path);
            }
        }

        let mut definitions = blocking(
            move || {
                let mut definitions = Vec::new();
                for path in paths.iter().filter(|p| p.is_file()) {
                    if let Some(definition) = atomic_read_json::<ModelDefinition>(path)? {
                        definitions.push(definition);
                    }
                }
                Ok(definitions)
            },
            "definition scan",
        )
        .await?;
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(definitions)
    }
}
