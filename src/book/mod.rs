//! Read-only book view over one feed entry.
//!
//! Accessors never fail: missing text fields yield [`UNKNOWN`], a missing
//! summary yields an empty string. The two link shapes of [`EntryLinks`] are
//! handled here so callers see one contract regardless of the source.

pub mod mime;

use std::collections::BTreeMap;

use crate::catalog::SourceConfig;
use crate::feed::{Entry, EntryLinks, REL_ACQUISITION};

/// Placeholder returned for missing text fields.
pub const UNKNOWN: &str = "Unknown";

/// Default link relation denoting a cover image.
pub const DEFAULT_COVER_RELATION: &str = "http://opds-spec.org/image";

/// One book (or sub-catalog descriptor) of a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    entry: Entry,
    summary_field: Option<String>,
    cover_relation: String,
    object_id: Option<String>,
}

impl Book {
    /// Wraps an entry with default field and relation choices.
    #[must_use]
    pub fn from_entry(entry: Entry) -> Self {
        Self {
            entry,
            summary_field: None,
            cover_relation: DEFAULT_COVER_RELATION.to_string(),
            object_id: None,
        }
    }

    /// Wraps an entry using the summary field and cover relation of a source.
    #[must_use]
    pub fn with_source(entry: Entry, config: &SourceConfig) -> Self {
        Self {
            entry,
            summary_field: config.summary_field.clone(),
            cover_relation: config
                .cover_link_relation
                .clone()
                .unwrap_or_else(|| DEFAULT_COVER_RELATION.to_string()),
            object_id: None,
        }
    }

    /// Attaches the identifier of the local document this book came from.
    #[must_use]
    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    #[must_use]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    #[must_use]
    pub fn title(&self) -> &str {
        non_blank(self.entry.title.as_deref()).unwrap_or(UNKNOWN)
    }

    #[must_use]
    pub fn author(&self) -> &str {
        non_blank(self.entry.author.as_deref()).unwrap_or(UNKNOWN)
    }

    #[must_use]
    pub fn publisher(&self) -> &str {
        self.entry.field("dcterms_publisher").unwrap_or(UNKNOWN)
    }

    #[must_use]
    pub fn language_code(&self) -> &str {
        self.entry.field("dcterms_language").unwrap_or(UNKNOWN)
    }

    /// Year part of the `published` (or `dcterms_issued`) date.
    #[must_use]
    pub fn published_year(&self) -> &str {
        let Some(published) = self
            .entry
            .field("published")
            .or_else(|| self.entry.field("dcterms_issued"))
        else {
            return UNKNOWN;
        };
        let published = published.trim();
        match published.get(..4) {
            Some(year) if year.bytes().all(|b| b.is_ascii_digit()) => year,
            _ => published,
        }
    }

    /// Summary text from the source's summary field, falling back to
    /// `summary` then `content`.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.summary_field
            .as_deref()
            .and_then(|field| self.entry.field(field))
            .or_else(|| self.entry.field("summary"))
            .or_else(|| self.entry.field("content"))
            .unwrap_or("")
    }

    /// Download URIs keyed by content type.
    ///
    /// For link lists, only acquisition relations count and the first link
    /// per content type wins.
    #[must_use]
    pub fn download_links(&self) -> BTreeMap<String, String> {
        match &self.entry.links {
            EntryLinks::ByType(links) => links.clone(),
            EntryLinks::List(links) => {
                let mut out = BTreeMap::new();
                for link in links {
                    if !link.rel.starts_with(REL_ACQUISITION) {
                        continue;
                    }
                    if let Some(media_type) = link.media_type.as_deref() {
                        out.entry(media_type.to_string())
                            .or_insert_with(|| link.href.clone());
                    }
                }
                out
            }
        }
    }

    /// Download URI for one content type.
    #[must_use]
    pub fn download_link(&self, content_type: &str) -> Option<String> {
        self.download_links().remove(content_type)
    }

    #[must_use]
    pub fn cover_image_url(&self) -> Option<&str> {
        self.entry
            .link_list()
            .iter()
            .find(|link| link.rel == self.cover_relation)
            .map(|link| link.href.as_str())
            .or_else(|| self.entry.field("cover_image"))
    }

    #[must_use]
    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    /// URI of the deeper catalog this entry points at.
    ///
    /// Prefers a sub-catalog relation, then any navigation feed link.
    #[must_use]
    pub fn catalog_uri(&self) -> Option<&str> {
        let links = self.entry.link_list();
        links
            .iter()
            .find(|link| link.is_subcatalog_relation())
            .or_else(|| {
                links.iter().find(|link| {
                    link.media_type
                        .as_deref()
                        .is_some_and(|t| t.starts_with("application/atom+xml"))
                })
            })
            .map(|link| link.href.as_str())
    }

    /// Archive item identifier, when the source provides one.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        self.entry.field("identifier")
    }

    /// Volume number of a multi-volume archive work.
    #[must_use]
    pub fn volume(&self) -> Option<&str> {
        non_blank(self.entry.field("volume"))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
