//! Error types for catalog fetches.
//!
//! Fetch failures are never raised into the caller's context; a worker sends
//! one of these through its completion channel instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::failure::FailureKind;

/// Errors that can occur while reading or parsing a catalog feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// An HTML page came back where a feed was expected.
    #[error("server returned {content_type} instead of a catalog for {url}")]
    ServerMisdirection { url: String, content_type: String },

    /// Local catalog file could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload is not a valid document of the expected format.
    #[error("malformed {format} catalog: {detail}")]
    Parse { format: &'static str, detail: String },

    /// The request URI is malformed.
    #[error("invalid catalog URI: {uri}")]
    InvalidUri { uri: String },
}

impl FetchError {
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

    /// Creates a misdirection error for an HTML response.
    pub fn server_misdirection(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::ServerMisdirection {
            url: url.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error for the given wire format.
    pub fn parse(format: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            format,
            detail: detail.into(),
        }
    }

    /// Creates an invalid URI error.
    pub fn invalid_uri(uri: impl Into<String>) -> Self {
        Self::InvalidUri { uri: uri.into() }
    }

    /// Maps this error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidUri { .. } => FailureKind::Network,
            Self::ServerMisdirection { .. } => FailureKind::ServerMisdirection,
            Self::Io { .. } => FailureKind::Io,
            Self::Parse { .. } => FailureKind::Parse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_carries_context() {
        let error = FetchError::http_status("https://example.org/opds", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "{msg}");
        assert!(msg.contains("https://example.org/opds"), "{msg}");
        assert_eq!(error.kind(), FailureKind::Network);
    }

    #[test]
    fn test_fetch_error_kinds() {
        assert_eq!(
            FetchError::server_misdirection("u", "text/html").kind(),
            FailureKind::ServerMisdirection
        );
        assert_eq!(FetchError::parse("csv", "short row").kind(), FailureKind::Parse);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(FetchError::io("/x", io).kind(), FailureKind::Io);
    }
}
