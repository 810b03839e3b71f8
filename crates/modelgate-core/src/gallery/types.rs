//! Gallery, descriptor, operation and job status records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path};

use crate::config::GalleryConfig;
use crate::error::{GalleryError, Result};

/// A named remote catalog of installable model descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gallery {
    pub name: String,
    /// Location of the catalog index: `http(s)://`, `file://` or a local path.
    pub url: String,
}

impl Gallery {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// An artifact file to place in the model directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFile {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub uri: String,
}

impl ModelFile {
    pub fn new(filename: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            sha256: None,
            uri: uri.into(),
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Reject file names that are empty, absolute, or climb out of the model directory.
    pub fn validate(&self) -> Result<()> {
        validate_relative_name("filename", &self.filename)
    }
}

/// Check that `name` is a plain relative path that stays inside its parent directory.
pub(crate) fn validate_relative_name(field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GalleryError::validation(field, "must not be empty"));
    }
    let path = Path::new(name);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.is_absolute() {
        return Err(GalleryError::validation(
            field,
            format!("'{}' must be relative to the model directory", name),
        ));
    }
    Ok(())
}

/// A model descriptor: either a catalog entry or the body of an install request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryModel {
    #[serde(default)]
    pub name: String,
    /// Location of the install config for this model.
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Fields merged onto the stored definition after install.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub overrides: Map<String, Value>,
    #[serde(default, rename = "files", skip_serializing_if = "Vec::is_empty")]
    pub additional_files: Vec<ModelFile>,
    /// Catalog this entry was found in, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gallery: Option<Gallery>,
    #[serde(default)]
    pub installed: bool,
}

impl GalleryModel {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// A named prompt template shipped with a model config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub content: String,
}

/// Install config fetched from a descriptor's `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Definition template written to the store, before overrides.
    #[serde(default)]
    pub config_file: Value,
    #[serde(default)]
    pub files: Vec<ModelFile>,
    #[serde(default)]
    pub prompt_templates: Vec<PromptTemplate>,
}

/// A queued unit of work: install, delete, or config-URL preload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GalleryOp {
    /// Caller-supplied correlation key for status lookups.
    pub id: String,
    #[serde(default)]
    pub request: GalleryModel,
    /// `name` or `name@gallery`. For deletes, the model name.
    #[serde(default)]
    pub gallery_reference: Option<String>,
    #[serde(default)]
    pub galleries: Vec<Gallery>,
    #[serde(default)]
    pub config_url: Option<String>,
    #[serde(default)]
    pub delete: bool,
}

impl GalleryOp {
    /// Direct install of an embedded descriptor, no catalog lookup.
    pub fn install(id: impl Into<String>, request: GalleryModel) -> Self {
        Self {
            id: id.into(),
            request,
            ..Default::default()
        }
    }

    /// Install resolved from the given catalogs.
    pub fn from_gallery(
        id: impl Into<String>,
        reference: impl Into<String>,
        galleries: Vec<Gallery>,
    ) -> Self {
        Self {
            id: id.into(),
            gallery_reference: Some(reference.into()),
            galleries,
            ..Default::default()
        }
    }

    /// Fetch and merge a definition file from a URL.
    pub fn from_config_url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Remove a model definition and its artifact files.
    pub fn delete(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            gallery_reference: Some(name.into()),
            delete: true,
            ..Default::default()
        }
    }

    pub fn with_request(mut self, request: GalleryModel) -> Self {
        self.request = request;
        self
    }

    /// The reference, treating an empty string as absent.
    pub fn reference(&self) -> Option<&str> {
        self.gallery_reference
            .as_deref()
            .filter(|r| !r.trim().is_empty())
    }

    /// The config URL, treating an empty string as absent.
    pub fn config_url(&self) -> Option<&str> {
        self.config_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

/// Progress and result of one job, keyed by job id in the status table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpStatus {
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
    /// Overall progress, 0 to 100.
    pub progress: f64,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub downloaded_bytes: u64,
    #[serde(default)]
    pub total_bytes: u64,
    /// Terminal flag; nothing changes once set.
    pub processed: bool,
    #[serde(default)]
    pub deletion: bool,
    #[serde(default)]
    pub gallery_model_name: String,
}

impl OpStatus {
    /// First status of a dequeued job.
    pub fn processing() -> Self {
        Self {
            message: GalleryConfig::PROCESSING_MESSAGE.to_string(),
            ..Default::default()
        }
    }

    pub fn completed(deletion: bool, gallery_model_name: impl Into<String>) -> Self {
        Self {
            message: GalleryConfig::COMPLETED_MESSAGE.to_string(),
            progress: 100.0,
            processed: true,
            deletion,
            gallery_model_name: gallery_model_name.into(),
            ..Default::default()
        }
    }

    /// Terminal error status. With `opaque`, the detail is never stored.
    pub fn failed(err: &GalleryError, opaque: bool) -> Self {
        if opaque {
            Self {
                error: Some(GalleryConfig::OPAQUE_ERROR_MESSAGE.to_string()),
                processed: true,
                ..Default::default()
            }
        } else {
            let detail = err.to_string();
            Self {
                message: format!("error: {}", detail),
                error: Some(detail),
                processed: true,
                ..Default::default()
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.processed && self.error.is_some()
    }
}
