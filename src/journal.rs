//! Document store for downloaded books.
//!
//! After a successful download the presentation layer hands the file and a
//! [`JournalEntry`] to a [`DocumentStore`]. [`DirectoryStore`] is the local
//! implementation: the file is copied into a root directory next to a
//! `<file>.json` metadata record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::book::mime::normalize_mime_type;
use crate::book::{Book, UNKNOWN};
use crate::download::resolve_unique_path;

/// Metadata record written with a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub language: String,
    pub source: String,
    pub summary: String,
    /// Normalized: the black-and-white PDF pseudo-type is stored as PDF.
    pub mime_type: String,
    /// Base64 of the cover image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Base64 of a preview raster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Name of the stored file; set by the store.
    #[serde(default)]
    pub file_name: String,
}

impl JournalEntry {
    /// Builds the record for a downloaded book. A volume number is folded
    /// into the title so volumes of one work stay distinguishable.
    #[must_use]
    pub fn from_download(
        book: &Book,
        source_name: &str,
        content_type: &str,
        cover: Option<&[u8]>,
        preview: Option<&[u8]>,
    ) -> Self {
        let title = match book.volume() {
            Some(volume) => format!("{} Volume {}", book.title(), volume.trim()),
            None => book.title().to_string(),
        };
        Self {
            title,
            author: book.author().to_string(),
            publisher: book.publisher().to_string(),
            language: book.language_code().to_string(),
            source: source_name.to_string(),
            summary: book.summary().to_string(),
            mime_type: normalize_mime_type(content_type).to_string(),
            cover_image: cover.map(|bytes| STANDARD.encode(bytes)),
            preview: preview.map(|bytes| STANDARD.encode(bytes)),
            file_name: String::new(),
        }
    }

    /// Display title: `Title, by Author` when the author is known.
    #[must_use]
    pub fn display_title(&self) -> String {
        if self.author.is_empty() || self.author == UNKNOWN {
            self.title.clone()
        } else {
            format!("{}, by {}", self.title, self.author)
        }
    }
}

/// A document registered in a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub path: PathBuf,
    pub metadata_path: PathBuf,
    pub entry: JournalEntry,
}

/// Errors that can occur while storing a document.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not serialize record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Persists downloaded files with their metadata.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Registers `file` under `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file or record cannot be written.
    async fn create(&self, entry: JournalEntry, file: &Path) -> Result<StoredDocument, StoreError>;
}

/// Stores documents as plain files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentStore for DirectoryStore {
    #[instrument(skip(self, entry), fields(root = %self.root.display(), file = %file.display()))]
    async fn create(&self, mut entry: JournalEntry, file: &Path) -> Result<StoredDocument, StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = resolve_unique_path(&self.root, &name);
        tokio::fs::copy(file, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        debug!(path = %path.display(), "copied document");

        entry.file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata_path = path.with_file_name(format!("{}.json", entry.file_name));
        let json = serde_json::to_vec_pretty(&entry).map_err(|source| StoreError::Serialize {
            path: metadata_path.clone(),
            source,
        })?;
        tokio::fs::write(&metadata_path, json)
            .await
            .map_err(|e| StoreError::io(&metadata_path, e))?;

        info!(path = %path.display(), title = %entry.display_title(), "document stored");
        Ok(StoredDocument {
            path,
            metadata_path,
            entry,
        })
    }
}
