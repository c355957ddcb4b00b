//! Failure classification and user-facing descriptors for query and download errors.
//!
//! Both [`FetchError`](crate::feed::FetchError) and
//! [`DownloadError`](crate::download::DownloadError) map onto [`FailureKind`]
//! so the presentation layer renders every failure through one table.

/// Error taxonomy shared by catalog queries and downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// Connect, timeout, HTTP status or transfer failure.
    Network,
    /// The server answered with an HTML page where data was expected.
    ServerMisdirection,
    /// The transfer completed but produced zero bytes.
    EmptyPayload,
    /// Malformed feed, CSV, JSON or manifest.
    Parse,
    /// No manifest entry matches the requested content type.
    NotFound,
    /// Local filesystem failure.
    Io,
    /// User- or system-initiated abort. Never delivered as a terminal event.
    Cancelled,
}

impl FailureKind {
    /// Stable lowercase label for logs and machine-readable output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::ServerMisdirection => "server-misdirection",
            Self::EmptyPayload => "empty-payload",
            Self::Parse => "parse",
            Self::NotFound => "not-found",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns the user-facing what/why/fix triple for this failure.
    #[must_use]
    pub fn describe(self) -> FailureDescriptor {
        match self {
            Self::Network => FailureDescriptor {
                kind: self,
                what: "Catalog or download server unreachable",
                why: "Connectivity, DNS or the remote server interrupted the request.",
                fix: "Check the network connection and try again.",
            },
            Self::ServerMisdirection => FailureDescriptor {
                kind: self,
                what: "Server returned a web page instead of the requested data",
                why: "The catalog path may be incorrect or the server is showing an error page.",
                fix: "Try another format or source, or retry later.",
            },
            Self::EmptyPayload => FailureDescriptor {
                kind: self,
                what: "Downloaded file is empty",
                why: "The server closed the transfer without sending any content.",
                fix: "Retry the download.",
            },
            Self::Parse => FailureDescriptor {
                kind: self,
                what: "Catalog response could not be read",
                why: "The source returned a feed in an unexpected or damaged format.",
                fix: "Check the source configuration or retry later.",
            },
            Self::NotFound => FailureDescriptor {
                kind: self,
                what: "Requested format not available",
                why: "The item does not list a file in the selected format.",
                fix: "Pick a different format for this book.",
            },
            Self::Io => FailureDescriptor {
                kind: self,
                what: "Local file could not be read or written",
                why: "The destination or catalog path is missing or not writable.",
                fix: "Check free space and permissions, then retry.",
            },
            Self::Cancelled => FailureDescriptor {
                kind: self,
                what: "Operation cancelled",
                why: "The request was stopped before it finished.",
                fix: "Start the search or download again.",
            },
        }
    }
}

/// User-facing description of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDescriptor {
    pub kind: FailureKind,
    pub what: &'static str,
    pub why: &'static str,
    pub fix: &'static str,
}

impl std::fmt::Display for FailureDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n  Why: {}\n  Fix: {}", self.what, self.why, self.fix)
    }
}
