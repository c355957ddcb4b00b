//! Discovery of catalogs on mounted removable volumes.
//!
//! A volume carries a catalog when a `catalog.xml` OPDS file sits at its
//! root. Each one found under a mount root becomes a local source keyed
//! `volume:<directory name>`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::catalog::SourceConfig;

/// File name of a volume's catalog.
pub const VOLUME_CATALOG_FILE: &str = "catalog.xml";

/// Registry key prefix of volume sources.
pub const VOLUME_KEY_PREFIX: &str = "volume:";

/// Mount roots scanned when none are given.
pub const DEFAULT_MOUNT_ROOTS: &[&str] = &["/media", "/run/media"];

/// Returns a source configuration for every `<root>/<volume>/catalog.xml`.
///
/// Unreadable roots are skipped. Results are sorted by volume path so the
/// registry order does not depend on directory iteration order.
#[must_use]
pub fn discover_volume_catalogs(roots: &[PathBuf]) -> Vec<SourceConfig> {
    let mut catalogs: Vec<PathBuf> = Vec::new();
    for root in roots {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(error) => {
                debug!(root = %root.display(), error = %error, "skipping unreadable mount root");
                continue;
            }
        };
        for entry in entries.flatten() {
            let catalog = entry.path().join(VOLUME_CATALOG_FILE);
            if catalog.is_file() {
                catalogs.push(catalog);
            }
        }
    }
    catalogs.sort();

    catalogs
        .into_iter()
        .filter_map(|catalog| volume_source(&catalog))
        .collect()
}

fn volume_source(catalog: &Path) -> Option<SourceConfig> {
    let volume = catalog.parent()?.file_name()?.to_string_lossy().into_owned();
    let Some(location) = catalog.to_str() else {
        warn!(path = %catalog.display(), "skipping volume catalog with non UTF-8 path");
        return None;
    };
    debug!(volume = %volume, path = location, "found volume catalog");
    Some(SourceConfig::new(
        format!("{VOLUME_KEY_PREFIX}{volume}"),
        volume,
        location,
    ))
}
