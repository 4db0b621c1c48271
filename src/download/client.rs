//! HTTP client wrapper for downloading single files.
//!
//! This module provides the `HttpClient` struct which streams one URL into a
//! target directory, reports progress per chunk, skips files that are already
//! present, and unpacks ZIP archives once they land.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, POOL_MAX_IDLE_PER_HOST};
use super::error::DownloadError;
use super::filename::filename_from_url;
use super::progress::{ProgressCallback, ProgressReporter};
use super::retry::{RetryPolicy, download_with_retry};
use crate::archive::{extract_in_place, is_archive};
use crate::format::format_bytes;

/// Default User-Agent for all requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    format!("dirdl/{}", env!("CARGO_PKG_VERSION"))
}

/// Client builder shared by the listing scraper and the download client.
///
/// Only connection setup is bounded by a timeout.
#[must_use]
pub fn default_client_builder() -> ClientBuilder {
    client_builder_with_connect_timeout(CONNECT_TIMEOUT_SECS)
}

fn client_builder_with_connect_timeout(connect_timeout_secs: u64) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .gzip(true)
        .user_agent(default_user_agent())
}

/// Something that can fetch one URL into a directory.
///
/// [`HttpClient`] is the production implementation; the batch scheduler only
/// depends on this trait.
#[async_trait]
pub trait FileDownloader: Send + Sync {
    /// Downloads `url` into `target_dir`, returning the local path.
    async fn download_file(
        &self,
        url: &str,
        target_dir: &Path,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PathBuf, DownloadError>;
}

/// HTTP client for downloading files with streaming support.
///
/// This client is designed to be created once and reused for multiple downloads,
/// taking advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use dirdl_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let path = client
///     .download_file("https://example.org/files/SNES/Game.zip", Path::new("./SNES"), None)
///     .await?;
/// println!("Saved to: {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with the default connect timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_connect_timeout(CONNECT_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with an explicit connect timeout.
    #[must_use]
    pub fn with_connect_timeout(connect_timeout_secs: u64) -> Self {
        let client = client_builder_with_connect_timeout(connect_timeout_secs)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Downloads `url` into `target_dir`.
    ///
    /// The local filename is the URL's last path segment. If that file
    /// already exists with a non-zero size no request is made and progress is
    /// reported as complete. ZIP files (downloaded or pre-existing) are then
    /// extracted in place.
    ///
    /// A failed transfer leaves any partial file on disk.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The target directory cannot be created
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns anything other than 200
    /// - Writing to disk fails
    /// - Extracting the archive fails
    #[instrument(skip(self, on_progress), fields(url = %url, target_dir = %target_dir.display()))]
    pub async fn download_file(
        &self,
        url: &str,
        target_dir: &Path,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PathBuf, DownloadError> {
        let mut reporter = ProgressReporter::new(url, on_progress);
        let result = self.download_file_inner(url, target_dir, &mut reporter).await;
        if let Err(error) = &result {
            reporter.fail(error);
        }
        result
    }

    /// Runs [`download_file`](Self::download_file) up to `attempts` times.
    ///
    /// The progress callback receives every attempt, each starting from zero.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt when all attempts fail.
    pub async fn download_file_with_retry(
        &self,
        url: &str,
        target_dir: &Path,
        on_progress: Option<&ProgressCallback>,
        attempts: u32,
    ) -> Result<PathBuf, DownloadError> {
        let policy = RetryPolicy::with_max_attempts(attempts);
        download_with_retry(self, url, target_dir, on_progress, &policy)
            .await
            .map(|(path, _)| path)
            .map_err(|(error, _)| error)
    }

    async fn download_file_inner(
        &self,
        url: &str,
        target_dir: &Path,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<PathBuf, DownloadError> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| DownloadError::io(target_dir, e))?;

        let parsed_url = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let file_path = target_dir.join(filename_from_url(&parsed_url));

        if let Some(existing) = existing_file_size(&file_path).await {
            info!(path = %file_path.display(), bytes = existing, "skipping existing file");
            reporter.already_complete(existing);
            extract_if_archive(&file_path).await?;
            return Ok(file_path);
        }

        info!(path = %file_path.display(), "downloading {url} -> {}", file_path.display());

        let response = self.client.get(parsed_url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        if response.status() != StatusCode::OK {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        reporter.set_total(response.content_length().unwrap_or(0));

        let mut file = File::create(&file_path)
            .await
            .map_err(|e| DownloadError::io(&file_path, e))?;
        stream_to_file(&mut file, response, url, &file_path, reporter).await?;
        reporter.finish();

        info!(
            path = %file_path.display(),
            bytes = reporter.bytes_done(),
            size = %format_bytes(reporter.bytes_done(), 2),
            "download complete"
        );

        extract_if_archive(&file_path).await?;
        Ok(file_path)
    }
}

#[async_trait]
impl FileDownloader for HttpClient {
    async fn download_file(
        &self,
        url: &str,
        target_dir: &Path,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<PathBuf, DownloadError> {
        HttpClient::download_file(self, url, target_dir, on_progress).await
    }
}

async fn existing_file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|meta| meta.is_file() && meta.len() > 0)
        .map(|meta| meta.len())
}

/// Streams the response body to file, reporting after every chunk.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    reporter: &mut ProgressReporter<'_>,
) -> Result<(), DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                // Keep what arrived so far on disk.
                writer
                    .flush()
                    .await
                    .map_err(|io| DownloadError::io(file_path, io))?;
                return Err(DownloadError::network(url, e));
            }
        };

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        reporter.advance(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(())
}

async fn extract_if_archive(path: &Path) -> Result<(), DownloadError> {
    if !is_archive(path) {
        return Ok(());
    }

    info!(path = %path.display(), "extracting");
    let archive_path = path.to_path_buf();
    let extracted_into = tokio::task::spawn_blocking(move || extract_in_place(&archive_path))
        .await
        .map_err(|e| DownloadError::interrupted(path.display().to_string(), e.to_string()))??;

    debug!(dir = %extracted_into.display(), "extracted into directory");
    Ok(())
}
