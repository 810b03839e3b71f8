//! Error types for the modelgate core.
//!
//! Every failure the gallery worker can hit maps onto one of four kinds
//! (validation, not found, I/O, reconciliation); `ErrorKind` exposes that
//! classification to adapters such as the HTTP server.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gallery operations.
#[derive(Debug, Error)]
pub enum GalleryError {
    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Lookup errors
    #[error("Model not found: {name}")]
    ModelNotFound { name: String },

    #[error("Gallery not found: {name}")]
    GalleryNotFound { name: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Network errors
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Hash mismatch for {file}: expected {expected}, got {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Post-mutation reload/preload errors
    #[error("Reconciliation failed during {stage}: {message}")]
    Reconciliation { stage: String, message: String },

    // Queue errors
    #[error("Gallery worker is not accepting operations")]
    QueueClosed,

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for gallery operations.
pub type Result<T> = std::result::Result<T, GalleryError>;

/// Coarse classification of a [`GalleryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed descriptor or reference.
    Validation,
    /// Unresolvable gallery reference or absent delete target.
    NotFound,
    /// Network or filesystem failure during install or store access.
    IoFailure,
    /// Post-mutation reload/preload failure.
    ReconciliationFailure,
    /// Queue or configuration plumbing.
    Internal,
}

impl From<std::io::Error> for GalleryError {
    fn from(err: std::io::Error) -> Self {
        GalleryError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for GalleryError {
    fn from(err: serde_json::Error) -> Self {
        GalleryError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        GalleryError::Network {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: err.to_string(),
        }
    }
}

impl GalleryError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        GalleryError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        GalleryError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wrap a reload/preload failure, keeping the original message.
    pub fn reconciliation(stage: impl Into<String>, err: &GalleryError) -> Self {
        let message = match err {
            GalleryError::Reconciliation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        GalleryError::Reconciliation {
            stage: stage.into(),
            message,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GalleryError::Validation { .. }
            | GalleryError::Json { .. }
            | GalleryError::HashMismatch { .. } => ErrorKind::Validation,

            GalleryError::ModelNotFound { .. } | GalleryError::GalleryNotFound { .. } => {
                ErrorKind::NotFound
            }

            GalleryError::Io { .. }
            | GalleryError::Network { .. }
            | GalleryError::DownloadFailed { .. } => ErrorKind::IoFailure,

            GalleryError::Reconciliation { .. } => ErrorKind::ReconciliationFailure,

            GalleryError::QueueClosed | GalleryError::Config { .. } | GalleryError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}
