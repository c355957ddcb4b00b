//! HTTP client wrapper for book and cover transfers.
//!
//! [`HttpClient`] streams a resource to a destination path, reporting
//! progress through a callback and checking a stop flag at every chunk.
//! Local sources (`file://` URIs or bare paths on a mounted volume) are
//! copied through the same path so callers never special-case them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::book::mime::is_html_content_type;
use crate::user_agent;

/// Chunk size for local copies.
const LOCAL_CHUNK_BYTES: usize = 64 * 1024;

/// HTTP client for downloading files with streaming support.
///
/// Create once and reuse; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// Result of one completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Final output path.
    pub path: PathBuf,
    /// Bytes written to `path`.
    pub bytes_transferred: u64,
    /// Expected size when the server announced one.
    pub bytes_total: Option<u64>,
    /// `Content-Type` reported by the server, if any.
    pub content_type: Option<String>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large files)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Transfers `source` to `destination`, calling `on_progress` with
    /// `(bytes_transferred, bytes_total)` after every chunk.
    ///
    /// The stop flag is checked before the request and at every chunk. On
    /// any failure, including cancellation, the partial file is removed.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid or the request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - The server returns an HTML page (`ServerMisdirection`)
    /// - Nothing was written (`EmptyPayload`)
    /// - Writing to disk fails
    /// - The stop flag was raised (`Cancelled`)
    #[instrument(skip(self, stop, on_progress), fields(destination = %destination.display()))]
    pub async fn transfer<F>(
        &self,
        source: &str,
        destination: &Path,
        stop: &AtomicBool,
        mut on_progress: F,
    ) -> Result<TransferOutcome, DownloadError>
    where
        F: FnMut(u64, Option<u64>),
    {
        if stop.load(Ordering::SeqCst) {
            return Err(DownloadError::cancelled(source));
        }
        debug!("starting transfer");

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let result = match local_source_path(source) {
            Some(path) => copy_local(&path, destination, stop, &mut on_progress).await,
            None => {
                self.stream_remote(source, destination, stop, &mut on_progress)
                    .await
            }
        }
        .and_then(|outcome| classify_outcome(source, outcome));

        match result {
            Ok(outcome) => {
                info!(
                    path = %outcome.path.display(),
                    bytes = outcome.bytes_transferred,
                    "transfer complete"
                );
                Ok(outcome)
            }
            Err(error) => {
                debug!(path = %destination.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(destination).await;
                Err(error)
            }
        }
    }

    /// Fetches a small resource (manifest, cover image) into memory.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` on invalid URL, network failure or HTTP error
    /// status.
    #[instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.send_get(url).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| DownloadError::network(url, e))?;
        Ok(body.to_vec())
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }
        Ok(response)
    }

    async fn stream_remote(
        &self,
        url: &str,
        destination: &Path,
        stop: &AtomicBool,
        on_progress: &mut impl FnMut(u64, Option<u64>),
    ) -> Result<TransferOutcome, DownloadError> {
        let response = self.send_get(url).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes_total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut bytes_transferred: u64 = 0;

        while let Some(chunk_result) = stream.next().await {
            if stop.load(Ordering::SeqCst) {
                return Err(DownloadError::cancelled(url));
            }
            let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(destination, e))?;
            bytes_transferred += chunk.len() as u64;
            on_progress(bytes_transferred, bytes_total);
        }

        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        Ok(TransferOutcome {
            path: destination.to_path_buf(),
            bytes_transferred,
            bytes_total,
            content_type,
        })
    }
}

/// Returns the local path for `file://` URIs and bare paths.
fn local_source_path(source: &str) -> Option<PathBuf> {
    match Url::parse(source) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(_) => None,
        Err(_) => Some(PathBuf::from(source)),
    }
}

async fn copy_local(
    source: &Path,
    destination: &Path,
    stop: &AtomicBool,
    on_progress: &mut impl FnMut(u64, Option<u64>),
) -> Result<TransferOutcome, DownloadError> {
    let mut input = File::open(source)
        .await
        .map_err(|e| DownloadError::io(source, e))?;
    let bytes_total = input.metadata().await.ok().map(|meta| meta.len());
    let output = File::create(destination)
        .await
        .map_err(|e| DownloadError::io(destination, e))?;
    let mut writer = BufWriter::new(output);
    let mut buf = vec![0_u8; LOCAL_CHUNK_BYTES];
    let mut bytes_transferred: u64 = 0;

    loop {
        if stop.load(Ordering::SeqCst) {
            return Err(DownloadError::cancelled(source.display().to_string()));
        }
        let read = input
            .read(&mut buf)
            .await
            .map_err(|e| DownloadError::io(source, e))?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buf[..read])
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        bytes_transferred += read as u64;
        on_progress(bytes_transferred, bytes_total);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(destination, e))?;

    Ok(TransferOutcome {
        path: destination.to_path_buf(),
        bytes_transferred,
        bytes_total,
        content_type: None,
    })
}

/// Rejects transfers that completed but did not produce the requested file.
///
/// An HTML content type fails even when bytes were written and no transfer
/// error occurred.
fn classify_outcome(source: &str, outcome: TransferOutcome) -> Result<TransferOutcome, DownloadError> {
    if let Some(content_type) = outcome.content_type.as_deref()
        && is_html_content_type(content_type)
    {
        return Err(DownloadError::server_misdirection(source, content_type));
    }
    if outcome.bytes_transferred == 0 {
        return Err(DownloadError::empty_payload(source));
    }
    Ok(outcome)
}
