//! Artifact download with progress reporting and SHA-256 verification.
//!
//! Downloads land in a `.partial` temp file next to the destination and are
//! renamed into place only after the checksum matches.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::gallery::ModelFile;
use crate::network::client::HttpClient;
use crate::network::location::Location;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::{GalleryError, Result};

/// Position of a file within a multi-file install, used to scale progress.
#[derive(Debug, Clone, Copy)]
pub struct FileSlot {
    pub index: usize,
    pub count: usize,
}

impl FileSlot {
    fn overall(&self, file_percent: f64) -> f64 {
        if self.count == 0 {
            return file_percent;
        }
        ((self.index as f64 * 100.0) + file_percent) / self.count as f64
    }
}

/// Compute the hex SHA-256 of a file.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| GalleryError::io_with_path(e, path))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| GalleryError::io_with_path(e, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fetch `file` into `dest`, skipping the transfer when a matching copy is already present.
///
/// Returns the number of bytes transferred (0 when skipped).
pub async fn download_file(
    client: &HttpClient,
    file: &ModelFile,
    dest: &Path,
    progress: &ProgressSink,
    slot: FileSlot,
) -> Result<u64> {
    if dest.exists() {
        match &file.sha256 {
            Some(expected) => {
                let actual = sha256_file(dest).await?;
                if actual.eq_ignore_ascii_case(expected) {
                    info!("{} already present with matching checksum", dest.display());
                    emit_done(progress, file, slot, 0);
                    return Ok(0);
                }
                warn!(
                    "{} exists with checksum {}, expected {}; downloading again",
                    dest.display(),
                    actual,
                    expected
                );
                tokio::fs::remove_file(dest)
                    .await
                    .map_err(|e| GalleryError::io_with_path(e, dest))?;
            }
            None => {
                warn!("{} already exists and has no checksum, keeping it", dest.display());
                emit_done(progress, file, slot, 0);
                return Ok(0);
            }
        }
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| GalleryError::io_with_path(e, parent))?;
    }

    let temp_path = PathBuf::from(format!(
        "{}{}",
        dest.display(),
        NetworkConfig::DOWNLOAD_TEMP_SUFFIX
    ));

    let result = match Location::parse(&file.uri)? {
        Location::Remote(url) => {
            fetch_remote(client, url.as_str(), file, &temp_path, progress, slot).await
        }
        Location::Local(src) => copy_local(&src, file, &temp_path, progress, slot).await,
    };

    let (bytes, digest) = match result {
        Ok(done) => done,
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    if let Some(expected) = &file.sha256 {
        if !digest.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(GalleryError::HashMismatch {
                file: file.filename.clone(),
                expected: expected.clone(),
                actual: digest,
            });
        }
    }

    tokio::fs::rename(&temp_path, dest).await.map_err(|e| {
        GalleryError::io_with_path(e, dest)
    })?;

    info!("Downloaded {} bytes to {}", bytes, dest.display());
    emit_done(progress, file, slot, bytes);
    Ok(bytes)
}

fn emit_done(progress: &ProgressSink, file: &ModelFile, slot: FileSlot, bytes: u64) {
    progress.emit(
        ProgressEvent::new(&file.filename, bytes, bytes).with_percent(slot.overall(100.0)),
    );
}

async fn fetch_remote(
    client: &HttpClient,
    url: &str,
    file: &ModelFile,
    temp_path: &Path,
    progress: &ProgressSink,
    slot: FileSlot,
) -> Result<(u64, String)> {
    let response = client.get_download(url).await?;
    let total = response.content_length().unwrap_or(0);

    let mut out = tokio::fs::File::create(temp_path)
        .await
        .map_err(|e| GalleryError::io_with_path(e, temp_path))?;
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut last_update = Instant::now();
    let mut stream = response.bytes_stream();

    progress.emit(ProgressEvent::new(&file.filename, 0, total).with_percent(slot.overall(0.0)));

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GalleryError::DownloadFailed {
            url: url.to_string(),
            message: format!("Error reading download stream: {}", e),
        })?;
        out.write_all(&chunk)
            .await
            .map_err(|e| GalleryError::io_with_path(e, temp_path))?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;

        if last_update.elapsed() >= NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL {
            let event = ProgressEvent::new(&file.filename, downloaded, total);
            let overall = slot.overall(event.percent);
            progress.emit(event.with_percent(overall));
            last_update = Instant::now();
        }
    }

    out.flush()
        .await
        .map_err(|e| GalleryError::io_with_path(e, temp_path))?;
    out.sync_all()
        .await
        .map_err(|e| GalleryError::io_with_path(e, temp_path))?;

    debug!("Fetched {} bytes from {}", downloaded, url);
    Ok((downloaded, hex::encode(hasher.finalize())))
}

async fn copy_local(
    src: &Path,
    file: &ModelFile,
    temp_path: &Path,
    progress: &ProgressSink,
    slot: FileSlot,
) -> Result<(u64, String)> {
    let bytes = tokio::fs::copy(src, temp_path)
        .await
        .map_err(|e| GalleryError::io_with_path(e, src))?;
    progress.emit(
        ProgressEvent::new(&file.filename, bytes, bytes).with_percent(slot.overall(100.0)),
    );
    let digest = sha256_file(temp_path).await?;
    Ok((bytes, digest))
}
