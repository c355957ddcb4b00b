//! Catalog source configuration.
//!
//! The sources file is INI-like: one `[section]` per catalog source plus an
//! optional `[GetBooks]` section with global settings.
//!
//! ```text
//! [feedbooks]
//! name = Feedbooks
//! query_uri = https://catalog.feedbooks.com/search.atom?query=
//! opds_cover = http://opds-spec.org/image
//! blacklist = Popular, New
//!
//! [GetBooks]
//! show_images = true
//! languages = en, es
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

/// Section holding global settings rather than a source.
pub const GLOBAL_SECTION: &str = "GetBooks";

/// Wire format a source's responses are parsed as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceFormat {
    /// Atom/OPDS XML feed.
    #[default]
    Opds,
    /// Legacy denormalized archive CSV export.
    ArchiveCsv,
    /// JSON array dumped from an offline catalog.
    OfflineJson,
}

impl SourceFormat {
    /// Stable label used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opds => "opds",
            Self::ArchiveCsv => "archive_csv",
            Self::OfflineJson => "offline_json",
        }
    }
}

impl FromStr for SourceFormat {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "opds" => Ok(Self::Opds),
            "archive_csv" => Ok(Self::ArchiveCsv),
            "offline_json" => Ok(Self::OfflineJson),
            _ => Err("expected one of: opds, archive_csv, offline_json"),
        }
    }
}

/// Connection parameters of one catalog source. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Section name; the key the registry looks sources up by.
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Query URI; `{searchTerms}` is substituted, otherwise the term is appended.
    pub query_uri_template: String,
    /// Link relation denoting the cover image.
    pub cover_link_relation: Option<String>,
    /// Entry field holding the summary.
    pub summary_field: Option<String>,
    /// Sub-catalog titles to suppress.
    pub blacklisted_subcatalog_titles: BTreeSet<String>,
    pub format: SourceFormat,
    /// Prefix item files live under (archive and offline sources).
    pub download_base: Option<String>,
}

impl SourceConfig {
    /// Creates an OPDS source with no optional settings.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        query_uri_template: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            query_uri_template: query_uri_template.into(),
            cover_link_relation: None,
            summary_field: None,
            blacklisted_subcatalog_titles: BTreeSet::new(),
            format: SourceFormat::Opds,
            download_base: None,
        }
    }

    /// Returns true if the title is on this source's blacklist.
    #[must_use]
    pub fn is_blacklisted(&self, title: &str) -> bool {
        self.blacklisted_subcatalog_titles.contains(title.trim())
    }
}

/// Global settings from the `[GetBooks]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    pub show_images: bool,
    /// Language allow-list; empty means all languages.
    pub languages: Vec<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            show_images: true,
            languages: Vec::new(),
        }
    }
}

/// Parsed contents of a sources file, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
    pub settings: GlobalSettings,
}

/// Errors raised while loading the sources file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config syntax on line {line}: expected `[section]` or `key = value`")]
    Syntax { line: usize },

    #[error("configuration key '{key}' on line {line} appears before any section")]
    KeyOutsideSection { line: usize, key: String },

    #[error("unknown configuration key '{key}' in [{section}] on line {line}")]
    UnknownKey {
        line: usize,
        section: String,
        key: String,
    },

    #[error("invalid value '{value}' for `{key}` on line {line}: {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        reason: &'static str,
    },

    #[error("[{section}] is missing required key `{key}`")]
    MissingKey { section: String, key: &'static str },

    #[error("section [{section}] declared twice (line {line})")]
    DuplicateSection { line: usize, section: String },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    fn invalid_value(line: usize, key: &str, value: &str, reason: &'static str) -> Self {
        Self::InvalidValue {
            line,
            key: key.to_string(),
            value: value.to_string(),
            reason,
        }
    }
}

/// Partially read source section; required keys are checked on close.
struct PendingSource {
    key: String,
    name: Option<String>,
    query_uri: Option<String>,
    config: SourceConfig,
}

impl PendingSource {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            name: None,
            query_uri: None,
            config: SourceConfig::new(key, "", ""),
        }
    }

    fn finish(self) -> Result<SourceConfig, ConfigError> {
        let name = self.name.ok_or_else(|| ConfigError::MissingKey {
            section: self.key.clone(),
            key: "name",
        })?;
        let query_uri = self.query_uri.ok_or_else(|| ConfigError::MissingKey {
            section: self.key.clone(),
            key: "query_uri",
        })?;
        Ok(SourceConfig {
            name,
            query_uri_template: query_uri,
            ..self.config
        })
    }
}

enum Section {
    None,
    Global,
    Source(PendingSource),
}

/// Parses the text of a sources file.
///
/// # Errors
///
/// Returns [`ConfigError`] with the offending line for malformed lines,
/// unknown keys and invalid values, and names the section for missing
/// required keys.
pub fn parse_sources(raw: &str) -> Result<SourcesFile, ConfigError> {
    let mut file = SourcesFile::default();
    let mut section = Section::None;
    let mut seen = BTreeSet::new();

    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[') {
            let Some(name) = header.strip_suffix(']').map(str::trim) else {
                return Err(ConfigError::Syntax { line: line_no });
            };
            if name.is_empty() {
                return Err(ConfigError::Syntax { line: line_no });
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::DuplicateSection {
                    line: line_no,
                    section: name.to_string(),
                });
            }
            close_section(&mut file, std::mem::replace(&mut section, Section::None))?;
            section = if name == GLOBAL_SECTION {
                Section::Global
            } else {
                Section::Source(PendingSource::new(name))
            };
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax { line: line_no });
        };
        let key = raw_key.trim();
        let value = raw_value.trim();

        match &mut section {
            Section::None => {
                return Err(ConfigError::KeyOutsideSection {
                    line: line_no,
                    key: key.to_string(),
                });
            }
            Section::Global => apply_global_key(&mut file.settings, line_no, key, value)?,
            Section::Source(pending) => apply_source_key(pending, line_no, key, value)?,
        }
    }

    close_section(&mut file, section)?;
    Ok(file)
}

fn close_section(file: &mut SourcesFile, section: Section) -> Result<(), ConfigError> {
    if let Section::Source(pending) = section {
        file.sources.push(pending.finish()?);
    }
    Ok(())
}

fn apply_global_key(
    settings: &mut GlobalSettings,
    line: usize,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match key {
        "show_images" => {
            settings.show_images = parse_boolean(value)
                .ok_or_else(|| ConfigError::invalid_value(line, key, value, "expected true or false"))?;
        }
        "languages" => settings.languages = parse_list(value),
        unknown => {
            return Err(ConfigError::UnknownKey {
                line,
                section: GLOBAL_SECTION.to_string(),
                key: unknown.to_string(),
            });
        }
    }
    Ok(())
}

fn apply_source_key(
    pending: &mut PendingSource,
    line: usize,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    let non_empty = || {
        if value.is_empty() {
            Err(ConfigError::invalid_value(line, key, value, "value must not be empty"))
        } else {
            Ok(value.to_string())
        }
    };
    match key {
        "name" => pending.name = Some(non_empty()?),
        "query_uri" => pending.query_uri = Some(non_empty()?),
        "opds_cover" => pending.config.cover_link_relation = Some(non_empty()?),
        "summary_field" => pending.config.summary_field = Some(non_empty()?),
        "blacklist" => {
            pending.config.blacklisted_subcatalog_titles = parse_list(value).into_iter().collect();
        }
        "format" => {
            pending.config.format = value
                .parse()
                .map_err(|reason| ConfigError::invalid_value(line, key, value, reason))?;
        }
        "download_base" => {
            pending.config.download_base = Some(non_empty()?.trim_end_matches('/').to_string());
        }
        unknown => {
            return Err(ConfigError::UnknownKey {
                line,
                section: pending.key.clone(),
                key: unknown.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
