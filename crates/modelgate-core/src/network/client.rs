//! HTTP client wrapper.
//!
//! Wraps reqwest with the gateway's user agent and timeouts, and turns
//! non-success statuses into [`GalleryError::Network`].

use crate::config::NetworkConfig;
use crate::{GalleryError, Result};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// HTTP client used for catalog, config and artifact fetches.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    download_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom connect timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| GalleryError::Network {
                url: "<client>".to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            download_timeout: NetworkConfig::DOWNLOAD_REQUEST_TIMEOUT,
        })
    }

    /// GET a small document (catalog index, install config).
    pub async fn get(&self, url: &str) -> Result<Response> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| GalleryError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Self::check_status(response, url)
    }

    /// GET a large artifact with the long download timeout.
    pub async fn get_download(&self, url: &str) -> Result<Response> {
        debug!("GET (download) {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| GalleryError::DownloadFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Self::check_status(response, url)
    }

    fn check_status(response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(GalleryError::Network {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new().unwrap();
        assert_eq!(
            client.download_timeout,
            NetworkConfig::DOWNLOAD_REQUEST_TIMEOUT
        );
    }
}
