//! GetBooks Core Library
//!
//! Searches book catalogs (OPDS feeds, legacy archive CSV exports, offline
//! JSON dumps, catalogs on removable volumes) and downloads the selected
//! books with progress reporting and cooperative cancellation.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`feed`] - Feed model, wire-format parsers and the background fetcher
//! - [`book`] - Normalized read-only view over one catalog entry
//! - [`catalog`] - Source configuration and the source registry
//! - [`query`] - One catalog query: classification, pagination, cancellation
//! - [`download`] - Streaming downloads as single-use background jobs
//! - [`archive`] - Archive item file resolution through manifests
//! - [`journal`] - Document store for downloaded books
//!
//! Workers never touch caller-owned state. Each job reports over a channel
//! and the owner applies the result when it asks for the next event.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod book;
pub mod catalog;
pub mod download;
pub mod failure;
pub mod feed;
pub mod journal;
pub mod language;
pub mod query;
pub mod slot;
pub mod volume;

#[cfg(test)]
pub(crate) mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use archive::ArchiveManifestResolver;
pub use book::Book;
pub use catalog::{CatalogSource, CatalogSourceRegistry, ConfigError, SourceConfig, SourceFormat};
pub use download::{
    DownloadError, DownloadEvent, DownloadOutcome, FileDownloader, HttpClient, JobState,
};
pub use failure::{FailureDescriptor, FailureKind};
pub use feed::{Feed, FeedFetcher, FeedRequest, FetchError};
pub use journal::{DirectoryStore, DocumentStore, JournalEntry, StoreError, StoredDocument};
pub use language::LanguageNames;
pub use query::{QueryError, QueryEvent, QueryResult, QueryState};
pub use slot::{Cancellable, Slot};
