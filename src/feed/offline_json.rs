//! Offline JSON catalog parser.
//!
//! The offline catalog is a JSON array of book documents as exported from a
//! CouchDB-style library server:
//! `{"_id", "name", "authors": [], "editor": [], "blurb", "tags": [],
//! "languages": [], "_attachments": {"file.epub": {"content_type": ..}}}`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Entry, EntryLinks, Feed, FetchError};

const FORMAT: &str = "json";

#[derive(Debug, Deserialize)]
struct OfflineRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    editor: Vec<String>,
    #[serde(default)]
    blurb: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(rename = "_id", default)]
    id: Option<Value>,
    #[serde(rename = "_attachments", default)]
    attachments: BTreeMap<String, Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default)]
    content_type: Option<String>,
}

/// Parses an offline JSON catalog.
///
/// When `download_base` is given, attachments become download links at
/// `<download_base>/<_id>/<attachment name>`; an image attachment becomes
/// the entry's `cover_image`.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the payload is not a JSON array of
/// book records.
pub fn parse_offline_json(bytes: &[u8], download_base: Option<&str>) -> Result<Feed, FetchError> {
    let records: Vec<OfflineRecord> =
        serde_json::from_slice(bytes).map_err(|e| FetchError::parse(FORMAT, e.to_string()))?;
    let base = download_base.map(|b| b.trim_end_matches('/'));

    let entries: Vec<Entry> = records
        .into_iter()
        .map(|record| record_to_entry(record, base))
        .collect();
    debug!(entries = entries.len(), "parsed offline JSON catalog");

    Ok(Feed {
        title: None,
        links: Vec::new(),
        entries,
    })
}

fn record_to_entry(record: OfflineRecord, base: Option<&str>) -> Entry {
    let id = record.id.as_ref().and_then(|value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let mut fields = BTreeMap::new();
    let mut insert = |key: &str, value: String| {
        if !value.trim().is_empty() {
            fields.insert(key.to_string(), value);
        }
    };
    insert("dcterms_publisher", record.editor.join(", "));
    insert("summary", record.blurb.unwrap_or_default());
    insert("tags", record.tags.join(", "));
    insert(
        "dcterms_language",
        record.languages.first().cloned().unwrap_or_default(),
    );
    insert("languages", record.languages.join(","));
    if let Some(id) = &id {
        insert("id", id.clone());
    }

    let mut links = BTreeMap::new();
    if let (Some(base), Some(id)) = (base, &id) {
        for (name, attachment) in &record.attachments {
            let Some(content_type) = attachment.content_type.as_deref() else {
                continue;
            };
            let href = format!("{base}/{id}/{}", urlencoding::encode(name));
            if content_type.starts_with("image/") {
                fields.entry("cover_image".to_string()).or_insert(href);
            } else {
                links.entry(content_type.to_string()).or_insert(href);
            }
        }
    }

    Entry {
        title: record.name.filter(|n| !n.trim().is_empty()),
        author: Some(record.authors.join(", ")).filter(|a| !a.is_empty()),
        fields,
        links: EntryLinks::ByType(links),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {"_id": 12, "name": "Ti Pwason", "authors": ["Mari", "Jan"], "editor": ["LFA"],
         "blurb": "A small fish.", "tags": ["animals"], "languages": ["HT", "EN"],
         "_attachments": {"ti pwason.epub": {"content_type": "application/epub+zip"},
                          "cover.jpg": {"content_type": "image/jpeg"}}},
        {"_id": "abc", "name": "Bare"}
    ]"#;

    #[test]
    fn test_parse_offline_json_maps_record_fields() {
        let feed = parse_offline_json(CATALOG.as_bytes(), Some("https://lib.example/catalog/")).unwrap();
        assert_eq!(feed.entries.len(), 2);
        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_deref(), Some("Ti Pwason"));
        assert_eq!(entry.author.as_deref(), Some("Mari, Jan"));
        assert_eq!(entry.field("dcterms_publisher"), Some("LFA"));
        assert_eq!(entry.field("summary"), Some("A small fish."));
        assert_eq!(entry.field("dcterms_language"), Some("HT"));
        assert_eq!(entry.field("languages"), Some("HT,EN"));
        assert_eq!(entry.field("id"), Some("12"));
        assert_eq!(
            entry.field("cover_image"),
            Some("https://lib.example/catalog/12/cover.jpg")
        );
        let EntryLinks::ByType(links) = &entry.links else {
            panic!("expected denormalized links");
        };
        assert_eq!(
            links.get("application/epub+zip").map(String::as_str),
            Some("https://lib.example/catalog/12/ti%20pwason.epub")
        );
    }

    #[test]
    fn test_parse_offline_json_sparse_record() {
        let feed = parse_offline_json(CATALOG.as_bytes(), None).unwrap();
        let entry = &feed.entries[1];
        assert_eq!(entry.title.as_deref(), Some("Bare"));
        assert_eq!(entry.author, None);
        assert_eq!(entry.field("id"), Some("abc"));
        assert_eq!(entry.links, EntryLinks::ByType(BTreeMap::new()));
    }

    #[test]
    fn test_parse_offline_json_rejects_non_array() {
        let err = parse_offline_json(br#"{"rows": []}"#, None).unwrap_err();
        assert!(matches!(err, FetchError::Parse { format: "json", .. }));
    }
}
