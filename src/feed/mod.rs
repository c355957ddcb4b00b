//! Parsed catalog feeds and the background fetcher that produces them.
//!
//! A [`Feed`] is the common shape every catalog wire format is parsed into:
//! feed-level links plus an ordered list of [`Entry`] records. Three parsers
//! are provided, selected by source configuration rather than sniffed:
//!
//! - [`parse_atom`] - Atom/OPDS XML feeds
//! - [`parse_archive_csv`] - legacy denormalized archive CSV exports
//! - [`parse_offline_json`] - JSON arrays from an offline catalog dump
//!
//! [`FeedFetcher`] performs the read on a dedicated tokio task and hands the
//! parsed result back through a channel; it never touches shared state.

mod archive_csv;
mod atom;
mod error;
mod fetcher;
mod offline_json;

pub use archive_csv::{ARCHIVE_CSV_MIN_COLUMNS, parse_archive_csv};
pub use atom::parse_atom;
pub use error::FetchError;
pub use fetcher::{FeedFetcher, FetchCompletion, WorkerHandle};
pub use offline_json::parse_offline_json;

use std::collections::BTreeMap;
use std::path::PathBuf;

use url::Url;

/// Link relation advertising the next page of a paginated feed.
pub const REL_NEXT: &str = "next";

/// Link relation prefix for OPDS acquisition links.
pub const REL_ACQUISITION: &str = "http://opds-spec.org/acquisition";

/// Link relation marking a feed whose entries are all navigation entries.
pub const REL_CRAWLABLE: &str = "http://opds-spec.org/crawlable";

/// One `<link>` of a feed or entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub media_type: Option<String>,
    pub href: String,
    pub title: Option<String>,
}

impl Link {
    /// Creates a link without a title.
    #[must_use]
    pub fn new(rel: impl Into<String>, media_type: Option<&str>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            media_type: media_type.map(str::to_string),
            href: href.into(),
            title: None,
        }
    }

    /// Returns true if this relation points at a deeper catalog
    /// (`subsection`, or an OPDS `popular`/`new` listing).
    #[must_use]
    pub fn is_subcatalog_relation(&self) -> bool {
        let tag = self.rel.rsplit('/').next().unwrap_or(&self.rel);
        matches!(tag, "subsection" | "popular" | "new")
    }
}

/// Links of an entry in one of the two shapes observed in catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLinks {
    /// OPDS shape: a list of `{rel, type, href}` links.
    List(Vec<Link>),
    /// Denormalized archive shape: content type mapped directly to a URI.
    ByType(BTreeMap<String, String>),
}

impl Default for EntryLinks {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// One feed record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Source-specific fields (`dcterms_publisher`, `dcterms_language`,
    /// `published`, `summary`, `identifier`, `cover_image`, ...).
    pub fields: BTreeMap<String, String>,
    pub links: EntryLinks,
}

impl Entry {
    /// Returns a non-blank field value.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns the entry's link list; empty for denormalized entries.
    #[must_use]
    pub fn link_list(&self) -> &[Link] {
        match &self.links {
            EntryLinks::List(links) => links,
            EntryLinks::ByType(_) => &[],
        }
    }

    /// Returns true if any link of this entry is a sub-catalog relation.
    #[must_use]
    pub fn has_subcatalog_link(&self) -> bool {
        self.link_list().iter().any(Link::is_subcatalog_relation)
    }
}

/// A parsed catalog response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub title: Option<String>,
    pub links: Vec<Link>,
    pub entries: Vec<Entry>,
}

impl Feed {
    /// Returns the first feed-level link with the given relation.
    #[must_use]
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    /// Returns the verbatim URI of the next page, if advertised.
    #[must_use]
    pub fn next_page_uri(&self) -> Option<&str> {
        self.link(REL_NEXT).map(|link| link.href.as_str())
    }

    /// Returns true if the feed advertises itself as crawlable.
    #[must_use]
    pub fn is_crawlable(&self) -> bool {
        self.links
            .iter()
            .any(|link| link.rel == REL_CRAWLABLE || link.rel == "crawlable")
    }
}

/// What a fetch worker reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    /// HTTP(S) GET, optionally with an `Accept-Language` preference.
    Remote {
        uri: String,
        accept_language: Option<String>,
    },
    /// Read of a catalog file on local storage.
    Local { path: PathBuf },
}

impl FeedRequest {
    /// Builds a request from a URI or path.
    ///
    /// `http`/`https` URIs become remote requests, `file://` URIs and bare
    /// paths become local reads.
    #[must_use]
    pub fn from_location(location: &str, accept_language: Option<String>) -> Self {
        if let Ok(url) = Url::parse(location) {
            match url.scheme() {
                "http" | "https" => {
                    return Self::Remote {
                        uri: location.to_string(),
                        accept_language,
                    };
                }
                "file" => {
                    if let Ok(path) = url.to_file_path() {
                        return Self::Local { path };
                    }
                }
                _ => {}
            }
        }
        Self::Local {
            path: PathBuf::from(location),
        }
    }

    /// Human-readable location for logs and errors.
    #[must_use]
    pub fn location(&self) -> String {
        match self {
            Self::Remote { uri, .. } => uri.clone(),
            Self::Local { path } => path.display().to_string(),
        }
    }
}

/// Returns true if the location is read from local storage.
#[must_use]
pub fn is_local_location(location: &str) -> bool {
    matches!(
        FeedRequest::from_location(location, None),
        FeedRequest::Local { .. }
    )
}
