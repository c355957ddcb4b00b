//! The catalog-source capability interface and its implementations.
//!
//! A [`QueryResult`](crate::query::QueryResult) only needs a source to build
//! a request, parse the response and filter entries. Each wire format gets
//! one small implementation; new sources implement [`CatalogSource`] only.

use std::fmt::Debug;
use std::sync::Arc;

use super::config::{SourceConfig, SourceFormat};
use super::search::{build_query_uri, effective_language, matches_local_query};
use crate::book::Book;
use crate::feed::{
    Entry, Feed, FeedRequest, FetchError, is_local_location, parse_archive_csv, parse_atom,
    parse_offline_json,
};

/// Download prefix for archive items when the source does not set one.
pub const DEFAULT_ARCHIVE_DOWNLOAD_BASE: &str = "http://www.archive.org/download";

/// Capability interface of one catalog source.
pub trait CatalogSource: Debug + Send + Sync {
    /// Configuration this source was built from.
    fn config(&self) -> &SourceConfig;

    /// Registry key.
    fn key(&self) -> &str {
        &self.config().key
    }

    /// Human-readable name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// True if the catalog is read from local storage.
    fn is_local(&self) -> bool {
        is_local_location(&self.config().query_uri_template)
    }

    /// True if the whole catalog is read and matched client-side. Such
    /// sources accept an empty search term and read the template verbatim.
    fn filters_locally(&self) -> bool {
        self.is_local()
    }

    /// Builds the request for a search.
    fn build_request(&self, term: &str, language_filter: Option<&str>) -> FeedRequest {
        let template = &self.config().query_uri_template;
        if self.filters_locally() {
            return FeedRequest::from_location(template, None);
        }
        FeedRequest::from_location(
            &build_query_uri(template, term),
            effective_language(language_filter).map(str::to_string),
        )
    }

    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Parse`] for malformed payloads.
    fn parse(&self, bytes: &[u8]) -> Result<Feed, FetchError>;

    /// Returns true if the entry belongs in the result for this search.
    fn retains(&self, entry: &Entry, term: &str, _language_filter: Option<&str>) -> bool {
        !self.filters_locally() || matches_local_query(entry, term)
    }

    /// Wraps a retained entry as a book.
    fn make_book(&self, entry: Entry) -> Book {
        Book::with_source(entry, self.config())
    }
}

/// Atom/OPDS catalog, remote or on a local volume.
#[derive(Debug, Clone)]
pub struct OpdsSource {
    config: SourceConfig,
}

impl OpdsSource {
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }
}

impl CatalogSource for OpdsSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn parse(&self, bytes: &[u8]) -> Result<Feed, FetchError> {
        parse_atom(bytes)
    }
}

/// Legacy archive search endpoint answering with a CSV export.
#[derive(Debug, Clone)]
pub struct ArchiveCsvSource {
    config: SourceConfig,
}

impl ArchiveCsvSource {
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Prefix item files live under.
    #[must_use]
    pub fn download_base(&self) -> &str {
        self.config
            .download_base
            .as_deref()
            .unwrap_or(DEFAULT_ARCHIVE_DOWNLOAD_BASE)
    }
}

impl CatalogSource for ArchiveCsvSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn parse(&self, bytes: &[u8]) -> Result<Feed, FetchError> {
        parse_archive_csv(bytes, self.download_base())
    }
}

/// Offline JSON catalog dump, on local storage or served as a static file.
/// The dump has no server-side search, so it is always matched here.
#[derive(Debug, Clone)]
pub struct OfflineJsonSource {
    config: SourceConfig,
}

impl OfflineJsonSource {
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }
}

impl CatalogSource for OfflineJsonSource {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn filters_locally(&self) -> bool {
        true
    }

    fn parse(&self, bytes: &[u8]) -> Result<Feed, FetchError> {
        parse_offline_json(bytes, self.config.download_base.as_deref())
    }

    /// Local match plus a language filter over the record's `languages`.
    fn retains(&self, entry: &Entry, term: &str, language_filter: Option<&str>) -> bool {
        if !matches_local_query(entry, term) {
            return false;
        }
        let Some(language) = effective_language(language_filter) else {
            return true;
        };
        entry.field("languages").is_some_and(|languages| {
            languages
                .split(',')
                .any(|code| code.trim().eq_ignore_ascii_case(language))
        })
    }

    fn make_book(&self, entry: Entry) -> Book {
        let object_id = entry.field("id").map(str::to_string);
        let book = Book::with_source(entry, &self.config);
        match object_id {
            Some(id) => book.with_object_id(id),
            None => book,
        }
    }
}

/// Builds the source implementation selected by `config.format`.
#[must_use]
pub fn source_from_config(config: SourceConfig) -> Arc<dyn CatalogSource> {
    match config.format {
        SourceFormat::Opds => Arc::new(OpdsSource::new(config)),
        SourceFormat::ArchiveCsv => Arc::new(ArchiveCsvSource::new(config)),
        SourceFormat::OfflineJson => Arc::new(OfflineJsonSource::new(config)),
    }
}
