//! Legacy archive CSV export parser.
//!
//! The export is a denormalized table with a header row followed by one row
//! per item: `creator, description, format, identifier, language, publisher,
//! title[, volume]`. Download links are derived from the `format` column and
//! the item identifier, so entries come out in the flat
//! [`EntryLinks::ByType`] shape.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::{Entry, EntryLinks, Feed, FetchError};
use crate::book::mime::archive_format;

const FORMAT: &str = "csv";

/// Minimum number of columns a data row must carry.
pub const ARCHIVE_CSV_MIN_COLUMNS: usize = 7;

const COLUMN_CREATOR: usize = 0;
const COLUMN_DESCRIPTION: usize = 1;
const COLUMN_FORMAT: usize = 2;
const COLUMN_IDENTIFIER: usize = 3;
const COLUMN_LANGUAGE: usize = 4;
const COLUMN_PUBLISHER: usize = 5;
const COLUMN_TITLE: usize = 6;
const COLUMN_VOLUME: usize = 7;

/// Parses a legacy archive CSV export.
///
/// `download_base` is the prefix item files live under
/// (`<download_base>/<identifier>/<identifier><suffix>`).
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the CSV is malformed or any data row has
/// fewer than [`ARCHIVE_CSV_MIN_COLUMNS`] columns.
pub fn parse_archive_csv(bytes: &[u8], download_base: &str) -> Result<Feed, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let base = download_base.trim_end_matches('/');
    let mut feed = Feed::default();

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FetchError::parse(FORMAT, e.to_string()))?;
        if record.len() < ARCHIVE_CSV_MIN_COLUMNS {
            return Err(FetchError::parse(
                FORMAT,
                format!(
                    "row {} has {} columns, expected at least {ARCHIVE_CSV_MIN_COLUMNS}",
                    index + 2,
                    record.len()
                ),
            ));
        }

        let column = |i: usize| record.get(i).map(str::trim).unwrap_or_default();
        let identifier = column(COLUMN_IDENTIFIER);
        if identifier.is_empty() {
            warn!(row = index + 2, "skipping archive row without identifier");
            continue;
        }

        let mut links = BTreeMap::new();
        for name in column(COLUMN_FORMAT).split(',').map(str::trim) {
            let Some(format) = archive_format(name) else {
                debug!(format = name, identifier, "ignoring unsupported archive format");
                continue;
            };
            links
                .entry(format.content_type.to_string())
                .or_insert_with(|| format!("{base}/{identifier}/{identifier}{}", format.suffix));
        }

        let mut fields = BTreeMap::new();
        for (key, value) in [
            ("summary", column(COLUMN_DESCRIPTION)),
            ("identifier", identifier),
            ("dcterms_language", column(COLUMN_LANGUAGE)),
            ("dcterms_publisher", column(COLUMN_PUBLISHER)),
            ("volume", column(COLUMN_VOLUME)),
            ("formats", column(COLUMN_FORMAT)),
        ] {
            if !value.is_empty() {
                fields.insert(key.to_string(), value.to_string());
            }
        }
        fields.insert(
            "cover_image".to_string(),
            format!("{base}/{identifier}/__ia_thumb.jpg"),
        );

        feed.entries.push(Entry {
            title: Some(column(COLUMN_TITLE).to_string()).filter(|t| !t.is_empty()),
            author: Some(column(COLUMN_CREATOR).to_string()).filter(|a| !a.is_empty()),
            fields,
            links: EntryLinks::ByType(links),
        });
    }

    debug!(entries = feed.entries.len(), "parsed archive CSV export");
    Ok(feed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const HEADER: &str = "creator,description,format,identifier,language,publisher,title,volume\n";
    const BASE: &str = "http://www.archive.org/download";

    #[test]
    fn test_parse_archive_csv_row_builds_links_from_identifier() {
        let csv = format!("{HEADER}\"J. Verne\",desc,\"DjVu,PDF\",id123,en,PubCo,Title,\n");
        let feed = parse_archive_csv(csv.as_bytes(), BASE).unwrap();
        assert_eq!(feed.entries.len(), 1);
        let entry = &feed.entries[0];
        assert_eq!(entry.author.as_deref(), Some("J. Verne"));
        assert_eq!(entry.title.as_deref(), Some("Title"));
        assert_eq!(entry.field("identifier"), Some("id123"));
        assert_eq!(entry.field("volume"), None);
        let EntryLinks::ByType(links) = &entry.links else {
            panic!("expected denormalized links");
        };
        assert_eq!(
            links.get("image/vnd.djvu").map(String::as_str),
            Some("http://www.archive.org/download/id123/id123.djvu")
        );
        assert_eq!(
            links.get("application/pdf").map(String::as_str),
            Some("http://www.archive.org/download/id123/id123.pdf")
        );
    }

    #[test]
    fn test_parse_archive_csv_rejects_short_rows() {
        let csv = format!("{HEADER}a,b,c,d,e,f\n");
        let err = parse_archive_csv(csv.as_bytes(), BASE).unwrap_err();
        assert!(matches!(err, FetchError::Parse { format: "csv", .. }), "{err}");
        assert!(err.to_string().contains("expected at least 7"));
    }

    #[test]
    fn test_parse_archive_csv_accepts_seven_columns_and_skips_header() {
        let csv = format!("{HEADER}Anon,,EPUB,id9,es,,Cuentos\n");
        let feed = parse_archive_csv(csv.as_bytes(), "http://a/download/").unwrap();
        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_deref(), Some("Cuentos"));
        assert_eq!(entry.field("summary"), None);
        assert_eq!(
            entry.field("cover_image"),
            Some("http://a/download/id9/__ia_thumb.jpg")
        );
    }

    #[test]
    fn test_parse_archive_csv_header_only_is_empty_feed() {
        let feed = parse_archive_csv(HEADER.as_bytes(), BASE).unwrap();
        assert!(feed.entries.is_empty());
        assert!(feed.links.is_empty());
    }
}
