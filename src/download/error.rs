//! Error types for the download module.
//!
//! Download failures are delivered as the terminal event of a
//! [`FileDownloader`](super::FileDownloader), never raised into the owner.

use std::path::PathBuf;

use thiserror::Error;

use crate::failure::FailureKind;

/// Errors that can occur during file downloads.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server answered with an HTML page instead of the requested file.
    #[error("server returned {content_type} instead of a file for {url}")]
    ServerMisdirection {
        url: String,
        content_type: String,
    },

    /// The transfer completed without writing a single byte.
    #[error("empty file downloaded from {url}")]
    EmptyPayload { url: String },

    /// The item's file manifest could not be fetched or read.
    #[error("could not read file manifest {url}: {detail}")]
    Manifest { url: String, detail: String },

    /// No file of the requested content type is available for the item.
    #[error("no {content_type} file available for {item}")]
    NotFound { item: String, content_type: String },

    /// The transfer was stopped by its owner.
    #[error("download of {url} cancelled")]
    Cancelled { url: String },

    /// `start` was called on a downloader that already ran.
    #[error("downloader already started")]
    AlreadyStarted,
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a misdirection error for an HTML response.
    pub fn server_misdirection(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::ServerMisdirection {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates an empty-payload error.
    pub fn empty_payload(url: impl Into<String>) -> Self {
        Self::EmptyPayload { url: url.into() }
    }

    /// Creates a manifest error.
    pub fn manifest(url: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Manifest {
            url: url.into(),
            detail: detail.into(),
        }
    }

    /// Creates a not-found error for an item and content type.
    pub fn not_found(item: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::NotFound {
            item: item.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a cancellation marker.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Maps this error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidUrl { .. }
            | Self::Manifest { .. } => FailureKind::Network,
            Self::Io { .. } | Self::AlreadyStarted => FailureKind::Io,
            Self::ServerMisdirection { .. } => FailureKind::ServerMisdirection,
            Self::EmptyPayload { .. } => FailureKind::EmptyPayload,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry.
