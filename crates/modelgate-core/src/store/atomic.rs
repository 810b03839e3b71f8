//! Atomic JSON persistence for model definitions.
//!
//! Writes go to a temp file with a PID + sequence suffix, are synced to disk,
//! then renamed over the target so readers never observe a partial file.

use crate::{GalleryError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GalleryError::io_with_path(e, path)),
    };

    let data: T = serde_json::from_str(&contents).map_err(|e| GalleryError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically, creating parent directories as needed.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| GalleryError::Io {
                message: format!("Failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let temp_path = path.with_extension(format!("json.{}.{}.tmp", process::id(), sequence));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| GalleryError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;

    let write_result = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        file.sync_all()
    })();

    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(GalleryError::Io {
            message: format!("Failed to write temp file {}", temp_path.display()),
            path: Some(temp_path),
            source: Some(e),
        });
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        GalleryError::Io {
            message: format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            ),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}
