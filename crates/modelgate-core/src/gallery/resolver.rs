//! Resolution of model references against configured catalogs.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::gallery::types::{Gallery, GalleryModel, ModelConfig};
use crate::network::{fetch_json, HttpClient, Location};
use crate::{GalleryError, Result};

/// Looks up descriptors in catalogs and fetches their install configs.
///
/// Implementors provide [`fetch_index`](Self::fetch_index) and
/// [`fetch_config`](Self::fetch_config); lookup by name or reference is
/// shared.
#[async_trait]
pub trait GalleryResolver: Send + Sync {
    /// All entries of one catalog.
    async fn fetch_index(&self, gallery: &Gallery) -> Result<Vec<GalleryModel>>;

    /// The install config a descriptor's `url` points to.
    async fn fetch_config(&self, url: &str) -> Result<ModelConfig>;

    /// Entries of every catalog, in catalog order, tagged with their gallery.
    async fn list_models(&self, galleries: &[Gallery]) -> Result<Vec<GalleryModel>> {
        let mut models = Vec::new();
        for gallery in galleries {
            let entries = self.fetch_index(gallery).await?;
            models.extend(entries.into_iter().map(|mut entry| {
                entry.gallery = Some(gallery.clone());
                entry
            }));
        }
        Ok(models)
    }

    /// Resolve `name` inside the catalog called `gallery`.
    async fn resolve_by_reference(
        &self,
        name: &str,
        gallery: &str,
        galleries: &[Gallery],
    ) -> Result<GalleryModel> {
        let source = galleries
            .iter()
            .find(|g| g.name == gallery)
            .ok_or_else(|| GalleryError::GalleryNotFound {
                name: gallery.to_string(),
            })?;

        let entries = self.fetch_index(source).await?;
        entries
            .into_iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|mut entry| {
                entry.gallery = Some(source.clone());
                entry
            })
            .ok_or_else(|| GalleryError::ModelNotFound {
                name: format!("{}@{}", name, gallery),
            })
    }

    /// Resolve a bare `name`; the first catalog containing it wins.
    ///
    /// Catalogs that cannot be fetched are skipped. If nothing matched and
    /// some catalog failed, the last fetch error is returned.
    async fn resolve_by_name(&self, name: &str, galleries: &[Gallery]) -> Result<GalleryModel> {
        let mut last_error = None;
        for gallery in galleries {
            let entries = match self.fetch_index(gallery).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping gallery {}: {}", gallery.name, e);
                    last_error = Some(e);
                    continue;
                }
            };
            if let Some(mut entry) = entries
                .into_iter()
                .find(|entry| entry.name.eq_ignore_ascii_case(name))
            {
                debug!("Resolved {} in gallery {}", name, gallery.name);
                entry.gallery = Some(gallery.clone());
                return Ok(entry);
            }
        }

        Err(last_error.unwrap_or_else(|| GalleryError::ModelNotFound {
            name: name.to_string(),
        }))
    }
}

/// Resolver reading JSON catalog indexes and configs over HTTP(S) or from disk.
///
/// Relative `url` fields in an index resolve against the index location, and
/// relative file `uri`s in a config resolve against the config location.
#[derive(Debug, Clone)]
pub struct HttpGalleryResolver {
    client: HttpClient,
}

impl HttpGalleryResolver {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GalleryResolver for HttpGalleryResolver {
    async fn fetch_index(&self, gallery: &Gallery) -> Result<Vec<GalleryModel>> {
        let location = Location::parse(&gallery.url)?;
        let mut entries: Vec<GalleryModel> = fetch_json(&self.client, &location).await?;
        for entry in &mut entries {
            if !entry.url.is_empty() {
                entry.url = location.join(&entry.url)?.to_string();
            }
        }
        debug!("Gallery {} lists {} models", gallery.name, entries.len());
        Ok(entries)
    }

    async fn fetch_config(&self, url: &str) -> Result<ModelConfig> {
        let location = Location::parse(url)?;
        let mut config: ModelConfig = fetch_json(&self.client, &location).await?;
        for file in &mut config.files {
            file.uri = location.join(&file.uri)?.to_string();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(dir: &std::path::Path, name: &str, value: serde_json::Value) -> String {
        let path = dir.join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn setup() -> (TempDir, Vec<Gallery>) {
        let tmp = TempDir::new().unwrap();
        let first = write_json(
            tmp.path(),
            "first.json",
            json!([{"name": "llama", "url": "llama.json"}]),
        );
        let second = write_json(
            tmp.path(),
            "second.json",
            json!([
                {"name": "Llama", "url": "other-llama.json"},
                {"name": "phi", "url": "phi.json"}
            ]),
        );
        write_json(
            tmp.path(),
            "llama.json",
            json!({"name": "llama", "files": [{"filename": "llama.gguf", "uri": "blobs/llama.gguf"}]}),
        );
        let galleries = vec![Gallery::new("first", first), Gallery::new("second", second)];
        (tmp, galleries)
    }

    fn resolver() -> HttpGalleryResolver {
        HttpGalleryResolver::new(HttpClient::new().unwrap())
    }

    #[tokio::test]
    async fn test_first_gallery_wins_by_name() {
        let (tmp, galleries) = setup();
        let entry = resolver().resolve_by_name("LLAMA", &galleries).await.unwrap();
        assert_eq!(entry.gallery.unwrap().name, "first");
        assert_eq!(
            entry.url,
            tmp.path().join("llama.json").to_string_lossy().as_ref()
        );
    }

    #[tokio::test]
    async fn test_resolve_by_reference() {
        let (_tmp, galleries) = setup();
        let entry = resolver()
            .resolve_by_reference("llama", "second", &galleries)
            .await
            .unwrap();
        assert_eq!(entry.name, "Llama");
        assert!(entry.url.ends_with("other-llama.json"));

        let err = resolver()
            .resolve_by_reference("llama", "third", &galleries)
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::GalleryNotFound { .. }));

        let err = resolver()
            .resolve_by_reference("gemma", "first", &galleries)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_unreachable_gallery_is_skipped() {
        let (tmp, mut galleries) = setup();
        galleries.insert(
            0,
            Gallery::new("broken", tmp.path().join("missing.json").to_string_lossy()),
        );
        let entry = resolver().resolve_by_name("phi", &galleries).await.unwrap();
        assert_eq!(entry.gallery.unwrap().name, "second");

        let err = resolver().resolve_by_name("gemma", &galleries).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::IoFailure);
    }

    #[tokio::test]
    async fn test_fetch_config_resolves_relative_uris() {
        let (tmp, _galleries) = setup();
        let config = resolver()
            .fetch_config(&tmp.path().join("llama.json").to_string_lossy())
            .await
            .unwrap();
        assert_eq!(
            config.files[0].uri,
            tmp.path().join("blobs/llama.gguf").to_string_lossy().as_ref()
        );
    }

    #[tokio::test]
    async fn test_list_models_tags_gallery() {
        let (_tmp, galleries) = setup();
        let models = resolver().list_models(&galleries).await.unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(models[2].gallery.as_ref().unwrap().name, "second");
    }
}
