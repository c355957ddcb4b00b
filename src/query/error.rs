//! Error types for starting catalog queries.
//!
//! Only misuse is reported through these errors; fetch failures arrive as
//! [`QueryEvent::Failed`](super::QueryEvent::Failed).

use thiserror::Error;

/// Errors returned synchronously by [`QueryResult`](super::QueryResult).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Remote sources need a non-empty term; nothing was fetched.
    #[error("search term is empty; {source_name} requires a search term")]
    EmptySearchTerm { source_name: String },

    /// The query was already started; build a new one per search.
    #[error("query already started")]
    AlreadyStarted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_search_term_names_source() {
        let error = QueryError::EmptySearchTerm {
            source_name: "Feedbooks".into(),
        };
        assert!(error.to_string().contains("Feedbooks"));
    }
}
