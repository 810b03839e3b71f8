//! Installers place a model's artifacts and definition into the model path.

mod http;

pub use http::HttpInstaller;

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::gallery::ModelConfig;
use crate::progress::ProgressSink;
use crate::Result;

/// Fetches artifact files and writes the model definition.
///
/// Implementations must be idempotent: installing the same config twice
/// leaves the same files and definition on disk.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(
        &self,
        model_path: &Path,
        name: &str,
        config: &ModelConfig,
        overrides: &Map<String, Value>,
        progress: &ProgressSink,
    ) -> Result<()>;
}
