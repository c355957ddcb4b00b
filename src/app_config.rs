//! Sources-file lookup and registry construction for the CLI.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use getbooks_core::CatalogSourceRegistry;
use getbooks_core::volume::DEFAULT_MOUNT_ROOTS;
use tracing::{debug, info};

const CONFIG_DIR_NAME: &str = "getbooks";
const SOURCES_FILE_NAME: &str = "sources.ini";

/// Default sources-file location: `$XDG_CONFIG_HOME/getbooks/sources.ini`,
/// else `$HOME/.config/getbooks/sources.ini`.
pub(crate) fn default_sources_path(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    let config_root = xdg_config_home
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            home.filter(|v| !v.is_empty())
                .map(|home| PathBuf::from(home).join(".config"))
        })?;
    Some(config_root.join(CONFIG_DIR_NAME).join(SOURCES_FILE_NAME))
}

/// Builds the registry: an explicit `--config` must exist; otherwise the
/// default file is used when present, else the built-in sources.
pub(crate) fn load_registry(explicit: Option<&Path>) -> Result<CatalogSourceRegistry> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("sources file {} does not exist", path.display());
        }
        return CatalogSourceRegistry::load(path)
            .with_context(|| format!("failed to load sources file {}", path.display()));
    }

    let default_path = default_sources_path(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    );
    match default_path {
        Some(path) if path.is_file() => CatalogSourceRegistry::load(&path)
            .with_context(|| format!("failed to load sources file {}", path.display())),
        _ => {
            debug!("no sources file found; using built-in sources");
            CatalogSourceRegistry::builtin().context("built-in sources are invalid")
        }
    }
}

/// Adds volume catalogs found under `mount_roots` (or the default roots).
pub(crate) fn register_volumes(registry: &mut CatalogSourceRegistry, mount_roots: &[PathBuf]) {
    let roots: Vec<PathBuf> = if mount_roots.is_empty() {
        DEFAULT_MOUNT_ROOTS.iter().map(PathBuf::from).collect()
    } else {
        mount_roots.to_vec()
    };
    let count = registry.register_volume_catalogs(&roots);
    if count > 0 {
        info!(count, "found catalogs on mounted volumes");
    }
}
