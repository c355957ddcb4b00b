//! Sources command handler: list the catalog sources in the registry.

use anyhow::Result;
use getbooks_core::{CatalogSourceRegistry, LanguageNames};

pub fn run_sources_command(registry: &CatalogSourceRegistry) -> Result<()> {
    if registry.is_empty() {
        println!("No catalog sources configured.");
        return Ok(());
    }

    let key_width = registry.keys().iter().map(|k| k.len()).max().unwrap_or(0);
    for source in registry.iter() {
        let config = source.config();
        let location = if source.is_local() { "local" } else { "remote" };
        println!(
            "{:<key_width$}  {} [{}, {location}]",
            source.key(),
            source.name(),
            config.format.as_str(),
        );
    }

    let settings = registry.settings();
    if !settings.languages.is_empty() {
        let names = LanguageNames::default();
        println!("\nLanguages: {}", describe_languages(&names, &settings.languages));
    }
    Ok(())
}

/// `en (English), xx`. Codes without a known name are printed bare.
fn describe_languages(names: &LanguageNames, codes: &[String]) -> String {
    codes
        .iter()
        .map(|code| match names.full_name(code) {
            Some(name) => format!("{code} ({name})"),
            None => code.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
