//! Search-term normalization and local matching.

use std::sync::LazyLock;

use regex::Regex;

use crate::feed::Entry;

/// Placeholder substituted with the normalized term in query URI templates.
pub const SEARCH_TERMS_PLACEHOLDER: &str = "{searchTerms}";

/// Language filter value meaning "no filter".
pub const ALL_LANGUAGES: &str = "all";

/// Separators between local query tokens: whitespace and `+`.
#[allow(clippy::expect_used)]
static LOCAL_TOKEN_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s+]+").expect("token separator regex is valid"));

/// Normalizes a term for a remote query: lower-cased, split on whitespace,
/// each token percent-encoded, tokens joined with `+`.
#[must_use]
pub fn normalize_search_term(term: &str) -> String {
    term.to_lowercase()
        .split_whitespace()
        .map(|token| urlencoding::encode(token).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

/// Combines a query URI template with a search term.
#[must_use]
pub fn build_query_uri(template: &str, term: &str) -> String {
    let normalized = normalize_search_term(term);
    if template.contains(SEARCH_TERMS_PLACEHOLDER) {
        template.replace(SEARCH_TERMS_PLACEHOLDER, &normalized)
    } else {
        format!("{template}{normalized}")
    }
}

/// Returns the language to send as `Accept-Language`, if any.
#[must_use]
pub fn effective_language(language_filter: Option<&str>) -> Option<&str> {
    language_filter
        .map(str::trim)
        .filter(|lang| !lang.is_empty() && *lang != ALL_LANGUAGES)
}

/// Splits a local query on whitespace and `+`.
#[must_use]
pub fn local_tokens(term: &str) -> Vec<&str> {
    LOCAL_TOKEN_SEPARATOR
        .split(term)
        .filter(|token| !token.is_empty())
        .collect()
}

/// Local match: every token must be a case-sensitive substring of the
/// title, author or publisher. An empty term matches everything.
#[must_use]
pub fn matches_local_query(entry: &Entry, term: &str) -> bool {
    let haystacks = [
        entry.title.as_deref().unwrap_or_default(),
        entry.author.as_deref().unwrap_or_default(),
        entry.field("dcterms_publisher").unwrap_or_default(),
    ];
    local_tokens(term)
        .iter()
        .all(|token| haystacks.iter().any(|field| field.contains(token)))
}
