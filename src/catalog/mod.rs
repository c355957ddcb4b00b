//! Catalog sources: configuration, the [`CatalogSource`] capability
//! interface, and the [`CatalogSourceRegistry`] that maps source keys to
//! sources.

mod config;
mod registry;
mod search;
mod source;

pub use config::{
    ConfigError, GLOBAL_SECTION, GlobalSettings, SourceConfig, SourceFormat, SourcesFile,
    parse_sources,
};
pub use registry::{BUILTIN_SOURCES, CatalogSourceRegistry};
pub use search::{
    ALL_LANGUAGES, SEARCH_TERMS_PLACEHOLDER, build_query_uri, effective_language, local_tokens,
    matches_local_query, normalize_search_term,
};
pub use source::{
    ArchiveCsvSource, CatalogSource, DEFAULT_ARCHIVE_DOWNLOAD_BASE, OfflineJsonSource, OpdsSource,
    source_from_config,
};
