//! CLI command handlers.

mod get;
mod search;
mod sources;

pub use get::run_get_command;
pub use search::run_search_command;
pub use sources::run_sources_command;

use anyhow::{Context, Result, anyhow, bail};
use getbooks_core::{CatalogSourceRegistry, FailureKind, QueryEvent, QueryResult};
use tracing::{debug, warn};

use crate::cli::QueryArgs;
use crate::progress::Spinner;

/// Runs a query to completion, following `next` links for up to `pages`
/// pages.
pub(crate) async fn run_query(
    registry: &CatalogSourceRegistry,
    args: &QueryArgs,
    pages: u32,
    show_progress: bool,
) -> Result<QueryResult> {
    let source = registry
        .get(&args.source)
        .with_context(|| format!("unknown source '{}' (see `getbooks sources`)", args.source))?;
    let language = args.language.as_deref();
    check_language(registry, language)?;

    let mut query = QueryResult::new(source);
    match &args.browse {
        Some(uri) => query.browse(uri, language)?,
        None => query.start(&args.term(), language)?,
    }

    let spinner = Spinner::start(
        show_progress,
        format!("Searching {}...", query.source().name()),
    );
    for page in 1..=pages {
        match query.next_event().await {
            Some(QueryEvent::Updated {
                added_books,
                added_subcatalogs,
            }) => {
                debug!(page, added_books, added_subcatalogs, "page applied");
                spinner.set_message(format!(
                    "Searching {}... {} books",
                    query.source().name(),
                    query.len()
                ));
            }
            Some(QueryEvent::Failed(error)) if query.is_ready() => {
                warn!(page, error = %error, "stopping at the last page that loaded");
                break;
            }
            Some(QueryEvent::Failed(error)) => {
                spinner.finish();
                return Err(failure_error(error.kind(), &error));
            }
            None => {
                spinner.finish();
                bail!("query ended without a result");
            }
        }
        if page == pages || !query.has_next() || !query.update_with_next() {
            break;
        }
    }
    spinner.finish();
    Ok(query)
}

/// Rejects language filters outside the configured allow-list.
fn check_language(registry: &CatalogSourceRegistry, language: Option<&str>) -> Result<()> {
    let allowed = &registry.settings().languages;
    match language {
        Some(lang)
            if !allowed.is_empty()
                && lang != getbooks_core::catalog::ALL_LANGUAGES
                && !allowed.iter().any(|a| a.eq_ignore_ascii_case(lang)) =>
        {
            bail!(
                "language '{lang}' is not enabled (configured: {})",
                allowed.join(", ")
            )
        }
        _ => Ok(()),
    }
}

/// Wraps a library failure with its user-facing description.
pub(crate) fn failure_error(kind: FailureKind, error: &dyn std::fmt::Display) -> anyhow::Error {
    anyhow!("{}\n  Detail: {error}", kind.describe())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_language_against_allow_list() {
        let registry: CatalogSourceRegistry =
            "[GetBooks]\nlanguages = en, fr\n[a]\nname = A\nquery_uri = http://a/?q=\n"
                .parse()
                .unwrap();
        assert!(check_language(&registry, Some("FR")).is_ok());
        assert!(check_language(&registry, Some("all")).is_ok());
        assert!(check_language(&registry, None).is_ok());
        assert!(check_language(&registry, Some("es")).is_err());

        let open = CatalogSourceRegistry::builtin().unwrap();
        assert!(check_language(&open, Some("es")).is_ok());
    }

    #[test]
    fn test_failure_error_includes_description_and_detail() {
        let err = failure_error(FailureKind::EmptyPayload, &"empty file downloaded from x");
        let text = err.to_string();
        assert!(text.contains("Downloaded file is empty"), "{text}");
        assert!(text.contains("empty file downloaded from x"), "{text}");
    }
}
