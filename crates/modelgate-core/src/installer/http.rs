//! Default installer: downloads over HTTP(S) or copies local files.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::PathsConfig;
use crate::gallery::{validate_relative_name, ModelConfig};
use crate::installer::Installer;
use crate::network::{download_file, FileSlot, HttpClient};
use crate::progress::ProgressSink;
use crate::store::{ModelDefinition, ModelStore};
use crate::{GalleryError, Result};

/// Places artifacts under the model path and records the definition in `store`.
#[derive(Clone)]
pub struct HttpInstaller {
    client: HttpClient,
    store: Arc<dyn ModelStore>,
}

impl HttpInstaller {
    pub fn new(client: HttpClient, store: Arc<dyn ModelStore>) -> Self {
        Self { client, store }
    }
}

#[async_trait]
impl Installer for HttpInstaller {
    async fn install(
        &self,
        model_path: &Path,
        name: &str,
        config: &ModelConfig,
        overrides: &Map<String, Value>,
        progress: &ProgressSink,
    ) -> Result<()> {
        validate_relative_name("name", name)?;
        for file in &config.files {
            file.validate()?;
        }
        for template in &config.prompt_templates {
            validate_relative_name("prompt_templates.name", &template.name)?;
        }

        // Build the definition up front so a bad template fails before any download.
        let mut definition = ModelDefinition::from_template(name, &config.config_file, overrides)?;
        if definition.model.is_empty() {
            if let Some(first) = config.files.first() {
                definition.model = first.filename.clone();
            }
        }

        tokio::fs::create_dir_all(model_path)
            .await
            .map_err(|e| GalleryError::io_with_path(e, model_path))?;

        info!(
            "Installing {} ({} files) into {}",
            name,
            config.files.len(),
            model_path.display()
        );

        let count = config.files.len();
        for (index, file) in config.files.iter().enumerate() {
            let dest = model_path.join(&file.filename);
            download_file(
                &self.client,
                file,
                &dest,
                progress,
                FileSlot { index, count },
            )
            .await?;
        }

        for template in &config.prompt_templates {
            let file_name = format!("{}.{}", template.name, PathsConfig::TEMPLATE_EXTENSION);
            let path = model_path.join(&file_name);
            tokio::fs::write(&path, &template.content)
                .await
                .map_err(|e| GalleryError::io_with_path(e, &path))?;
            debug!("Wrote prompt template {}", path.display());
            if !definition.templates.contains(&file_name) {
                definition.templates.push(file_name);
            }
        }

        self.store.write(&definition).await?;
        info!("Installed {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::{ModelFile, PromptTemplate};
    use crate::store::FsModelStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn installer(store: &Path) -> HttpInstaller {
        HttpInstaller::new(
            HttpClient::new().unwrap(),
            Arc::new(FsModelStore::new(store)),
        )
    }

    #[tokio::test]
    async fn test_install_from_local_files() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.gguf");
        std::fs::write(&source, b"weights").unwrap();
        let models = tmp.path().join("models");

        let config = ModelConfig {
            name: "tiny".into(),
            config_file: json!({"backend": "llama-cpp", "parameters": {"threads": 2}}),
            files: vec![ModelFile::new("tiny.gguf", source.to_string_lossy())],
            prompt_templates: vec![PromptTemplate {
                name: "tiny-chat".into(),
                content: "{{.Input}}".into(),
            }],
            ..Default::default()
        };
        let overrides = json!({"parameters": {"threads": 6}});

        for _ in 0..2 {
            installer(&models)
                .install(
                    &models,
                    "tiny",
                    &config,
                    overrides.as_object().unwrap(),
                    &ProgressSink::logging(),
                )
                .await
                .unwrap();
        }

        let store = FsModelStore::new(&models);
        let def = store.read("tiny").await.unwrap();
        assert_eq!(def.model, "tiny.gguf");
        assert_eq!(def.backend.as_deref(), Some("llama-cpp"));
        assert_eq!(def.parameters.threads, Some(6));
        assert_eq!(def.templates, vec!["tiny-chat.tmpl"]);
        assert_eq!(
            std::fs::read_to_string(models.join("tiny-chat.tmpl")).unwrap(),
            "{{.Input}}"
        );
        assert_eq!(std::fs::read(models.join("tiny.gguf")).unwrap(), b"weights");

        store.delete("tiny", &def.files()).await.unwrap();
        assert!(!models.join("tiny-chat.tmpl").exists());
        assert!(!models.join("tiny.gguf").exists());
    }

    #[tokio::test]
    async fn test_definition_goes_to_injected_store() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src.gguf");
        std::fs::write(&source, b"weights").unwrap();
        let models = tmp.path().join("models");
        let definitions = tmp.path().join("definitions");

        let config = ModelConfig {
            files: vec![ModelFile::new("tiny.gguf", source.to_string_lossy())],
            ..Default::default()
        };
        installer(&definitions)
            .install(
                &models,
                "tiny",
                &config,
                &Map::new(),
                &ProgressSink::logging(),
            )
            .await
            .unwrap();

        assert!(models.join("tiny.gguf").exists());
        assert!(!models.join("tiny.json").exists());
        let def = FsModelStore::new(&definitions).read("tiny").await.unwrap();
        assert_eq!(def.model, "tiny.gguf");
    }

    #[tokio::test]
    async fn test_escaping_filename_rejected_before_download() {
        let tmp = TempDir::new().unwrap();
        let config = ModelConfig {
            files: vec![ModelFile::new("../evil.gguf", "https://example.invalid/x")],
            ..Default::default()
        };
        let err = installer(tmp.path())
            .install(
                tmp.path(),
                "evil",
                &config,
                &Map::new(),
                &ProgressSink::logging(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(!tmp.path().join("evil.json").exists());
    }
}
