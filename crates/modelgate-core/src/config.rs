//! Centralized configuration for modelgate.
//!
//! Constant tables for network and gallery behaviour, plus the runtime
//! [`AppConfig`] assembled by the server binary from CLI flags.

use std::path::PathBuf;
use std::time::Duration;

use tracing::error;

use crate::gallery::Gallery;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(3600);
    pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".partial";
    pub const USER_AGENT: &'static str = "modelgate/0.6";
}

/// Gallery and job behaviour.
pub struct GalleryConfig;

impl GalleryConfig {
    /// Message stored on a job while it runs.
    pub const PROCESSING_MESSAGE: &'static str = "processing";
    /// Message stored on a job that finished successfully.
    pub const COMPLETED_MESSAGE: &'static str = "completed";
    /// Replacement error text when opaque errors are enabled.
    pub const OPAQUE_ERROR_MESSAGE: &'static str = "an error occurred";
    /// Separator between model name and gallery name in a reference.
    pub const REFERENCE_SEPARATOR: char = '@';
}

/// Directory and file naming inside the model path.
pub struct PathsConfig;

impl PathsConfig {
    pub const DEFINITION_EXTENSION: &'static str = "json";
    pub const TEMPLATE_EXTENSION: &'static str = "tmpl";
}

/// Defaults materialized into stored definitions that leave them unset.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionDefaults {
    pub context_size: u32,
    pub threads: u32,
    pub f16: bool,
}

impl Default for DefinitionDefaults {
    fn default() -> Self {
        Self {
            context_size: 512,
            threads: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(4),
            f16: false,
        }
    }
}

/// Runtime configuration shared by the gallery service, bulk apply and the server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding model definitions and artifact files.
    pub model_path: PathBuf,
    /// Catalogs at startup, in resolution order. The running service keeps the live list.
    pub galleries: Vec<Gallery>,
    /// Replace error detail in job statuses with a generic message.
    pub opaque_errors: bool,
    /// Bulk definition file applied at startup.
    pub preload_models_from_path: Option<PathBuf>,
    /// Inline JSON bulk payload applied at startup.
    pub preload_json_models: Option<String>,
    /// Definition files fetched into the model path at startup.
    pub models_url: Vec<String>,
    pub defaults: DefinitionDefaults,
    /// Bearer keys accepted by the HTTP API. Empty disables the check.
    pub api_keys: Vec<String>,
}

impl AppConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            galleries: Vec::new(),
            opaque_errors: false,
            preload_models_from_path: None,
            preload_json_models: None,
            models_url: Vec::new(),
            defaults: DefinitionDefaults::default(),
            api_keys: Vec::new(),
        }
    }

    pub fn with_galleries(mut self, galleries: impl IntoIterator<Item = Gallery>) -> Self {
        self.galleries.extend(galleries);
        self
    }

    /// Append galleries decoded from a JSON array.
    ///
    /// An empty string clears the list. Malformed JSON is logged and ignored.
    pub fn with_string_galleries(mut self, galleries: &str) -> Self {
        if galleries.trim().is_empty() {
            self.galleries.clear();
            return self;
        }
        match serde_json::from_str::<Vec<Gallery>>(galleries) {
            Ok(parsed) => self.galleries.extend(parsed),
            Err(e) => error!("failed loading galleries: {}", e),
        }
        self
    }

    pub fn with_opaque_errors(mut self, opaque: bool) -> Self {
        self.opaque_errors = opaque;
        self
    }

    pub fn with_preload_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.preload_models_from_path = Some(path.into());
        self
    }

    pub fn with_preload_json(mut self, payload: impl Into<String>) -> Self {
        self.preload_json_models = Some(payload.into());
        self
    }

    pub fn with_models_url(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.models_url.extend(urls);
        self
    }

    pub fn with_defaults(mut self, defaults: DefinitionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Require one of `keys` on API requests. Blank keys are dropped.
    pub fn with_api_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.api_keys.extend(
            keys.into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        );
        self
    }
}
