//! Locations of catalogs, install configs and artifacts.
//!
//! A location is either an `http(s)://` URL or a local file given as a
//! `file://` URL or a plain path.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use url::Url;

use crate::network::client::HttpClient;
use crate::{GalleryError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(GalleryError::validation("url", "must not be empty"));
        }

        match Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Location::Remote(url)),
                "file" => url.to_file_path().map(Location::Local).map_err(|_| {
                    GalleryError::validation("url", format!("invalid file URL '{}'", location))
                }),
                // Windows drive letters parse as one-letter schemes.
                scheme if scheme.len() == 1 => Ok(Location::Local(PathBuf::from(location))),
                scheme => Err(GalleryError::validation(
                    "url",
                    format!("unsupported scheme '{}' in '{}'", scheme, location),
                )),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Location::Local(PathBuf::from(location)))
            }
            Err(e) => Err(GalleryError::validation(
                "url",
                format!("'{}': {}", location, e),
            )),
        }
    }

    /// Resolve `reference` against this location. Absolute references are returned as-is.
    pub fn join(&self, reference: &str) -> Result<Self> {
        let reference = reference.trim();
        let is_relative = matches!(
            Url::parse(reference),
            Err(url::ParseError::RelativeUrlWithoutBase)
        ) && !Path::new(reference).is_absolute();

        if !is_relative {
            return Self::parse(reference);
        }

        match self {
            Location::Remote(base) => base.join(reference).map(Location::Remote).map_err(|e| {
                GalleryError::validation("url", format!("'{}': {}", reference, e))
            }),
            Location::Local(base) => {
                let dir = base.parent().unwrap_or_else(|| Path::new("."));
                Ok(Location::Local(dir.join(reference)))
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Remote(url) => write!(f, "{}", url),
            Location::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Read the whole document at `location`.
pub async fn read_location(client: &HttpClient, location: &Location) -> Result<Vec<u8>> {
    match location {
        Location::Remote(url) => {
            let response = client.get(url.as_str()).await?;
            let bytes = response.bytes().await.map_err(|e| GalleryError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(bytes.to_vec())
        }
        Location::Local(path) => tokio::fs::read(path)
            .await
            .map_err(|e| GalleryError::io_with_path(e, path)),
    }
}

/// Read and decode a JSON document at `location`.
pub async fn fetch_json<T: DeserializeOwned>(client: &HttpClient, location: &Location) -> Result<T> {
    let bytes = read_location(client, location).await?;
    serde_json::from_slice(&bytes).map_err(|e| GalleryError::Json {
        message: format!("Failed to parse {}: {}", location, e),
        source: Some(e),
    })
}
