//! ISO-639 language code to display name lookup.
//!
//! Names come from the iso-codes `iso_639.xml` table, read on first lookup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;
use tracing::{debug, warn};

/// System location of the iso-codes table.
pub const ISO_639_XML_PATH: &str = "/usr/share/xml/iso-codes/iso_639.xml";

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("could not read language table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed language table: {0}")]
    Parse(String),
}

/// Lazily loaded code → name table.
#[derive(Debug)]
pub struct LanguageNames {
    path: PathBuf,
    names: OnceLock<BTreeMap<String, String>>,
}

impl Default for LanguageNames {
    fn default() -> Self {
        Self::new(ISO_639_XML_PATH)
    }
}

impl LanguageNames {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            names: OnceLock::new(),
        }
    }

    /// Display name for a two-letter code, e.g. `fr` → `French`.
    ///
    /// A missing or unreadable table is logged once and yields `None` for
    /// every code.
    #[must_use]
    pub fn full_name(&self, code: &str) -> Option<String> {
        self.names
            .get_or_init(|| match load_table(&self.path) {
                Ok(names) => names,
                Err(error) => {
                    warn!(error = %error, "language names unavailable");
                    BTreeMap::new()
                }
            })
            .get(&code.trim().to_ascii_lowercase())
            .cloned()
    }

    /// Like [`full_name`](Self::full_name), falling back to the code itself.
    #[must_use]
    pub fn display_name(&self, code: &str) -> String {
        self.full_name(code).unwrap_or_else(|| code.to_string())
    }
}

fn load_table(path: &Path) -> Result<BTreeMap<String, String>, LanguageError> {
    let bytes = std::fs::read(path).map_err(|source| LanguageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let names = parse_iso_639(&bytes)?;
    debug!(path = %path.display(), languages = names.len(), "loaded language names");
    Ok(names)
}

/// Reads `iso_639_1_code`/`name` attribute pairs. Entries without a
/// two-letter code are skipped.
///
/// # Errors
///
/// Returns [`LanguageError::Parse`] for malformed XML.
pub fn parse_iso_639(bytes: &[u8]) -> Result<BTreeMap<String, String>, LanguageError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut names = BTreeMap::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| LanguageError::Parse(e.to_string()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"iso_639_entry" => {
                let mut code = None;
                let mut name = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| LanguageError::Parse(e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| LanguageError::Parse(e.to_string()))?
                        .into_owned();
                    match attr.key.local_name().as_ref() {
                        b"iso_639_1_code" => code = Some(value),
                        b"name" => name = Some(value),
                        _ => {}
                    }
                }
                if let (Some(code), Some(name)) = (code, name) {
                    names.insert(code, name);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(names)
}
