//! Source name → catalog source registry.
//!
//! Built once at startup from the sources file (or the built-in defaults)
//! and passed down explicitly; read-only apart from volume refreshes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use super::config::{ConfigError, GlobalSettings, SourceConfig, SourcesFile, parse_sources};
use super::source::{CatalogSource, source_from_config};
use crate::volume::{VOLUME_KEY_PREFIX, discover_volume_catalogs};

/// Sources used when no sources file exists.
pub const BUILTIN_SOURCES: &str = "\
[feedbooks]
name = Feedbooks
query_uri = https://catalog.feedbooks.com/search.atom?query=
opds_cover = http://opds-spec.org/image/thumbnail

[internet-archive]
name = Internet Archive
query_uri = https://bookserver.archive.org/catalog/opensearch?q={searchTerms}
opds_cover = http://opds-spec.org/image/thumbnail
";

/// Registry of catalog sources, in declaration order.
#[derive(Clone, Default)]
pub struct CatalogSourceRegistry {
    sources: Vec<Arc<dyn CatalogSource>>,
    settings: GlobalSettings,
}

impl fmt::Debug for CatalogSourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogSourceRegistry")
            .field("sources", &self.keys())
            .field("settings", &self.settings)
            .finish()
    }
}

impl CatalogSourceRegistry {
    /// Builds a registry from a parsed sources file.
    #[must_use]
    pub fn from_sources_file(file: SourcesFile) -> Self {
        let mut registry = Self {
            sources: Vec::new(),
            settings: file.settings,
        };
        for config in file.sources {
            registry.register(config);
        }
        registry
    }

    /// Registry with the built-in default sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] only if the built-in table is malformed.
    pub fn builtin() -> Result<Self, ConfigError> {
        BUILTIN_SOURCES.parse()
    }

    /// Loads a sources file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or a parse
    /// error for invalid contents.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry: Self = raw.parse()?;
        info!(path = %path.display(), sources = registry.len(), "loaded catalog sources");
        Ok(registry)
    }

    /// Adds a source, replacing any source with the same key in place.
    pub fn register(&mut self, config: SourceConfig) {
        let source = source_from_config(config);
        match self.sources.iter().position(|s| s.key() == source.key()) {
            Some(index) => self.sources[index] = source,
            None => self.sources.push(source),
        }
    }

    /// Replaces all volume sources with the catalogs currently found under
    /// `roots`. Returns the number of volume sources registered.
    pub fn register_volume_catalogs(&mut self, roots: &[PathBuf]) -> usize {
        self.sources
            .retain(|source| !source.key().starts_with(VOLUME_KEY_PREFIX));
        let found = discover_volume_catalogs(roots);
        let count = found.len();
        for config in found {
            self.register(config);
        }
        debug!(count, "registered volume catalogs");
        count
    }

    /// Looks a source up by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<dyn CatalogSource>> {
        self.sources.iter().find(|s| s.key() == key).cloned()
    }

    /// Source keys in declaration order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.key()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CatalogSource>> {
        self.sources.iter()
    }

    #[must_use]
    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl FromStr for CatalogSourceRegistry {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_sources(raw).map(Self::from_sources_file)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::SourceFormat;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_registry_has_default_sources() {
        let registry = CatalogSourceRegistry::builtin().unwrap();
        assert_eq!(registry.keys(), vec!["feedbooks", "internet-archive"]);
        let feedbooks = registry.get("feedbooks").unwrap();
        assert_eq!(feedbooks.name(), "Feedbooks");
        assert!(!feedbooks.is_local());
        assert!(registry.get("missing").is_none());
        assert!(registry.settings().show_images);
    }

    #[test]
    fn test_register_replaces_same_key_in_place() {
        let mut registry = CatalogSourceRegistry::builtin().unwrap();
        registry.register(SourceConfig {
            format: SourceFormat::ArchiveCsv,
            ..SourceConfig::new("feedbooks", "Replaced", "http://x/?q=")
        });
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys()[0], "feedbooks");
        assert_eq!(registry.get("feedbooks").unwrap().name(), "Replaced");
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = CatalogSourceRegistry::load(&dir.path().join("sources.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }), "{err}");
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sources.ini");
        std::fs::write(&path, "[a]\nname = A\nquery_uri = http://a/?q=\n").unwrap();
        let registry = CatalogSourceRegistry::load(&path).unwrap();
        assert_eq!(registry.keys(), vec!["a"]);
    }

    #[test]
    fn test_register_volume_catalogs_rebuilds_volume_sources() {
        let media = TempDir::new().unwrap();
        let usb = media.path().join("USB");
        std::fs::create_dir_all(&usb).unwrap();
        std::fs::write(usb.join("catalog.xml"), "<feed/>").unwrap();

        let mut registry = CatalogSourceRegistry::builtin().unwrap();
        let roots = vec![media.path().to_path_buf()];
        assert_eq!(registry.register_volume_catalogs(&roots), 1);
        assert_eq!(registry.register_volume_catalogs(&roots), 1);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("volume:USB").unwrap().is_local());

        std::fs::remove_file(usb.join("catalog.xml")).unwrap();
        assert_eq!(registry.register_volume_catalogs(&roots), 0);
        assert_eq!(registry.len(), 2);
    }
}
